//! Folder packaging for the lock/unlock flow
//!
//! Packs a directory tree into a deflate-compressed zip held entirely in
//! memory, and unpacks such an archive back into a directory. Entries are
//! named by their path relative to the source directory and are visited in
//! sorted order so that packing the same tree twice yields the same bytes.

use crate::error::{DirlockError, ErrorCategory, ErrorKind, Result};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Pack a directory tree into a single in-memory zip archive
///
/// Only regular files are archived; empty directories are not represented,
/// matching the zip convention of file-only entries.
pub fn create_archive(source_dir: &Path) -> Result<Vec<u8>> {
    if !source_dir.is_dir() {
        return Err(DirlockError::with_kind(
            ErrorCategory::User,
            ErrorKind::Archive,
            format!("{} is not a directory", source_dir.display()),
        ));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            DirlockError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Archive,
                format!("failed to walk {}", source_dir.display()),
                e,
            )
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel = path.strip_prefix(source_dir).map_err(|e| {
            DirlockError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Archive,
                format!("{} is outside of {}", path.display(), source_dir.display()),
                e,
            )
        })?;

        // Zip entry names use forward slashes regardless of platform.
        let name = rel
            .components()
            .map(|c| {
                c.as_os_str().to_str().ok_or_else(|| {
                    DirlockError::with_kind(
                        ErrorCategory::User,
                        ErrorKind::Archive,
                        format!("file name is not valid UTF-8: {}", path.display()),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?
            .join("/");

        zip.start_file(name, options).map_err(|e| {
            DirlockError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Archive,
                format!("failed to add archive entry for {}", path.display()),
                e,
            )
        })?;

        let contents = fs::read(path).map_err(|e| {
            DirlockError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to read from {}", path.display()),
                e,
            )
        })?;
        zip.write_all(&contents).map_err(|e| {
            DirlockError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Archive,
                format!("failed to write archive entry for {}", path.display()),
                e,
            )
        })?;
    }

    let cursor = zip.finish().map_err(|e| {
        DirlockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Archive,
            "failed to finalize archive",
            e,
        )
    })?;

    Ok(cursor.into_inner())
}

/// Unpack an in-memory zip archive into a directory
///
/// The destination directory is created if it does not exist.
pub fn extract_archive(archive: &[u8], destination: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).map_err(|e| {
        DirlockError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Archive,
            "input is not a valid zip archive",
            e,
        )
    })?;

    fs::create_dir_all(destination).map_err(|e| {
        DirlockError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to create {}", destination.display()),
            e,
        )
    })?;

    zip.extract(destination).map_err(|e| {
        DirlockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Archive,
            format!("failed to extract archive into {}", destination.display()),
            e,
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn build_tree(root: &Path) {
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("a.txt"), b"alpha").unwrap();
        fs::write(root.join("sub/b.txt"), b"beta").unwrap();
        fs::write(root.join("sub/deeper/c.bin"), [0u8, 1, 2, 255]).unwrap();
    }

    #[test]
    fn test_archive_roundtrip() {
        let src = TempDir::new().unwrap();
        build_tree(src.path());

        let bytes = create_archive(src.path()).unwrap();

        let dst = TempDir::new().unwrap();
        extract_archive(&bytes, dst.path()).unwrap();

        assert_eq!(fs::read(dst.path().join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(dst.path().join("sub/b.txt")).unwrap(), b"beta");
        assert_eq!(
            fs::read(dst.path().join("sub/deeper/c.bin")).unwrap(),
            [0u8, 1, 2, 255]
        );
    }

    #[test]
    fn test_archive_is_deterministic() {
        let src = TempDir::new().unwrap();
        build_tree(src.path());

        let first = create_archive(src.path()).unwrap();
        let second = create_archive(src.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_directory() {
        let src = TempDir::new().unwrap();
        let bytes = create_archive(src.path()).unwrap();

        let dst = TempDir::new().unwrap();
        let out = dst.path().join("restored");
        extract_archive(&bytes, &out).unwrap();

        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn test_source_is_not_a_directory() {
        let src = TempDir::new().unwrap();
        let file = src.path().join("plain.txt");
        fs::write(&file, b"not a directory").unwrap();

        let err = create_archive(&file).expect_err("expected archive error");
        assert_eq!(err.kind, Some(ErrorKind::Archive));
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let dst = TempDir::new().unwrap();
        let err = extract_archive(b"definitely not a zip", dst.path())
            .expect_err("expected archive error");
        assert_eq!(err.kind, Some(ErrorKind::Archive));
    }
}
