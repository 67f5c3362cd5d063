//! Dirlock - Password-based folder locking using PBKDF2 and AES-256-GCM

#![forbid(unsafe_code)]

pub mod archive;
pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod passphrase;
