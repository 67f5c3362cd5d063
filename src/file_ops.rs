//! High-level lock/unlock operations
//!
//! Ties the archive, passphrase, and envelope layers together: locking a
//! folder packs it and encrypts the archive, unlocking decrypts an envelope
//! back into the archive bytes (or directly into a directory).
//!
//! All outputs are written atomically (tempfile + fsync + rename) so a
//! failed operation never leaves behind a partial file that looks
//! successful. Output files are created with mode 0o600 on Unix.

use crate::archive;
use crate::envelope;
use crate::error::{DirlockError, ErrorCategory, ErrorKind, Result};
use crate::passphrase::PassphraseReader;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Lock a folder with a passphrase
///
/// Packs the directory tree at `folder` into an archive, encrypts it using a
/// passphrase from `passphrase_reader`, and writes the envelope to
/// `output_path`.
pub fn lock_folder(
    folder: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let plaintext = archive::create_archive(folder)
        .map_err(|e| e.with_context(format!("failed to archive {}", folder.display())))?;
    let passphrase = passphrase_reader.read_passphrase()?;
    let sealed = envelope::encrypt(&passphrase, &plaintext)
        .map_err(|e| e.with_context("encryption failed"))?;
    write_file_atomic(output_path, &sealed)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;

    Ok(())
}

/// Unlock an envelope file, writing the recovered archive bytes
///
/// Reads an envelope from `input_path`, decrypts it using a passphrase from
/// `passphrase_reader`, and writes the recovered archive to `output_path`.
pub fn unlock_file(
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let plaintext = read_and_decrypt(input_path, passphrase_reader)?;
    write_file_atomic(output_path, &plaintext)
        .map_err(|e| e.with_context(format!("failed to write to {}", output_path.display())))?;
    Ok(())
}

/// Unlock an envelope file, extracting the folder contents
///
/// As [`unlock_file`], but unpacks the recovered archive directly into
/// `destination` instead of writing the archive itself.
pub fn unlock_into(
    input_path: &Path,
    destination: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let plaintext = read_and_decrypt(input_path, passphrase_reader)?;
    archive::extract_archive(&plaintext, destination)
        .map_err(|e| e.with_context(format!("failed to extract into {}", destination.display())))?;
    Ok(())
}

fn read_and_decrypt(
    input_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<Vec<u8>> {
    let sealed = fs::read(input_path).map_err(|e| read_error(input_path, e))?;
    let passphrase = passphrase_reader.read_passphrase()?;
    envelope::decrypt(&passphrase, &sealed).map_err(|e| e.with_context("failed to decrypt"))
}

/// Write a file atomically with secure permissions
///
/// Writes to a tempfile in the target directory, flushes and fsyncs it, then
/// renames it over `path`. If any step fails the target is left untouched.
fn write_file_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    // An empty parent means a bare relative path, i.e. the current directory.
    let dir = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => {
            return Err(DirlockError::with_kind(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("{} has no parent directory", path.display()),
            ));
        }
    };

    let mut temp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        DirlockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;

    temp_file.write_all(contents).map_err(|e| {
        DirlockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write to tempfile",
            e,
        )
    })?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        DirlockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        DirlockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    // Persist with restrictive permissions before the rename makes it visible
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| {
                DirlockError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to get tempfile metadata",
                    e,
                )
            })?
            .permissions();
        perms.set_mode(0o600);
        temp_file.as_file().set_permissions(perms).map_err(|e| {
            DirlockError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to set tempfile permissions",
                e,
            )
        })?;
    }
    temp_file.persist(path).map_err(|e| {
        DirlockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn read_error(path: &Path, err: io::Error) -> DirlockError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    DirlockError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
