//! Source validation: make sure the path names a readable PDF before any
//! artifacts are touched.
//!
//! pdfium's own error for a non-PDF is an opaque format code. Checking the
//! `%PDF` magic bytes first turns "wrong file" into a precise input error,
//! and doing it before cleanup means a typo never deletes a previous run's
//! images.

use crate::error::DocTagError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn validate_source(path: &Path) -> Result<PathBuf, DocTagError> {
    let path = path.to_path_buf();

    if !path.is_file() {
        return Err(DocTagError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic != b"%PDF" => {
                    return Err(DocTagError::NotAPdf { path, magic });
                }
                Ok(()) => {}
                Err(e) => {
                    return Err(DocTagError::CorruptPdf {
                        path,
                        detail: format!("cannot read header: {e}"),
                    });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocTagError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(DocTagError::FileNotFound { path });
        }
    }

    debug!("Validated source PDF: {}", path.display());
    Ok(path)
}

/// The artifact stem for a source: its file name without extension.
pub fn source_stem(path: &Path) -> Result<String, DocTagError> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DocTagError::FileNotFound {
            path: path.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = validate_source(Path::new("/no/such/file.pdf")).unwrap_err();
        assert!(matches!(err, DocTagError::FileNotFound { .. }));
    }

    #[test]
    fn directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_source(dir.path()).unwrap_err();
        assert!(matches!(err, DocTagError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("notes.pdf");
        std::fs::write(&p, b"hello world").unwrap();
        match validate_source(&p).unwrap_err() {
            DocTagError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("tiny.pdf");
        std::fs::write(&p, b"%P").unwrap();
        assert!(matches!(
            validate_source(&p).unwrap_err(),
            DocTagError::CorruptPdf { .. }
        ));
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("ok.pdf");
        std::fs::write(&p, b"%PDF-1.7\n").unwrap();
        assert_eq!(validate_source(&p).unwrap(), p);
    }

    #[test]
    fn stem_drops_extension_and_dirs() {
        assert_eq!(
            source_stem(Path::new("/data/uploads/Budget 2024.pdf")).unwrap(),
            "Budget 2024"
        );
        assert_eq!(source_stem(Path::new("archive.tar.pdf")).unwrap(), "archive.tar");
    }
}
