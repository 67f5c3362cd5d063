//! Encryption/decryption using PBKDF2 + AES-256-GCM
//!
//! This module implements password-based encryption using:
//! - PBKDF2-HMAC-SHA-256 for key derivation from the password
//! - AES-256-GCM for authenticated encryption
//!
//! The binary format is:
//! - salt: 16 bytes
//! - nonce: 12 bytes (GCM IV)
//! - tag: 16 bytes (GCM authentication tag)
//! - ciphertext: variable length (same length as the plaintext)

use crate::error::{DirlockError, ErrorCategory, ErrorKind, Result};
use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce, Tag};
use pbkdf2::pbkdf2_hmac;
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of the GCM authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Length of derived key in bytes
const KEY_LEN: usize = 32;

/// Length of the fixed envelope header (everything before the ciphertext)
pub const HEADER_LEN: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

/// PBKDF2 iteration count
const PBKDF2_ITERATIONS: u32 = 200_000;

/// Derive a 32-byte key from a password and salt using PBKDF2-HMAC-SHA-256
///
/// Deterministic: identical (password, salt) always yields the identical key.
/// The key is wiped from memory when the returned wrapper is dropped.
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, PBKDF2_ITERATIONS, key.as_mut());
    key
}

/// Encrypt plaintext with a password using random salt and nonce
///
/// Returns the binary format: salt(16) + nonce(12) + tag(16) + ciphertext(variable)
pub fn encrypt(password: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.try_fill_bytes(&mut salt).map_err(|e| {
        DirlockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "OS random source unavailable while generating salt",
            e,
        )
    })?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.try_fill_bytes(&mut nonce).map_err(|e| {
        DirlockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            "OS random source unavailable while generating nonce",
            e,
        )
    })?;

    encrypt_with_params(password, plaintext, &salt, &nonce)
}

/// Encrypt plaintext with a password using provided salt and nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random
/// salt/nonce. Reusing a (key, nonce) pair destroys GCM's confidentiality and
/// authenticity guarantees.
pub fn encrypt_with_params(
    password: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let key = derive_key(password, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));

    // Encrypt in place with a detached tag so salt/nonce/tag/ciphertext can
    // be laid out in envelope order. No additional authenticated data.
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), b"", &mut buffer)
        .map_err(|_| {
            DirlockError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Cipher,
                "AES-256-GCM encryption failed",
            )
        })?;

    let mut output = Vec::with_capacity(HEADER_LEN + buffer.len());
    output.extend_from_slice(salt);
    output.extend_from_slice(nonce);
    output.extend_from_slice(tag.as_slice());
    output.extend_from_slice(&buffer);

    Ok(output)
}

/// Decrypt an envelope with a password
///
/// Parses the envelope strictly by fixed offsets: bytes [0, 16) salt,
/// [16, 28) nonce, [28, 44) tag, [44, ..) ciphertext. On tag mismatch no
/// plaintext is released; wrong password and corrupted data are
/// indistinguishable and are reported as a single error.
pub fn decrypt(password: &[u8], envelope: &[u8]) -> Result<Vec<u8>> {
    let mut pos = 0;

    if envelope.len() < pos + SALT_LEN {
        return Err(truncated("input likely truncated while reading salt"));
    }
    let salt: [u8; SALT_LEN] = envelope[pos..pos + SALT_LEN]
        .try_into()
        .map_err(|_| truncated("failed to read salt"))?;
    pos += SALT_LEN;

    if envelope.len() < pos + NONCE_LEN {
        return Err(truncated("input likely truncated while reading nonce"));
    }
    let nonce: [u8; NONCE_LEN] = envelope[pos..pos + NONCE_LEN]
        .try_into()
        .map_err(|_| truncated("failed to read nonce"))?;
    pos += NONCE_LEN;

    if envelope.len() < pos + TAG_LEN {
        return Err(truncated("input likely truncated while reading tag"));
    }
    let tag: [u8; TAG_LEN] = envelope[pos..pos + TAG_LEN]
        .try_into()
        .map_err(|_| truncated("failed to read tag"))?;
    pos += TAG_LEN;

    let ciphertext = &envelope[pos..];

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&nonce),
            b"",
            &mut buffer,
            Tag::from_slice(&tag),
        )
        .map_err(|_| {
            DirlockError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                "incorrect password, or corrupt or tampered-with envelope",
            )
        })?;

    Ok(buffer)
}

fn truncated(msg: &str) -> DirlockError {
    DirlockError::with_kind(ErrorCategory::User, ErrorKind::MalformedEnvelope, msg)
}
