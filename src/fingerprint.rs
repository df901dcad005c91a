//! Source-document fingerprinting for index change detection.
//!
//! The fingerprint is a SHA-256 over the per-file SHA-256 digests, in the
//! order the paths are given. Same bytes in the same order always give
//! the same fingerprint. Reordering paths may change it, so callers must
//! pass paths in a stable order (the configured order).

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use civic_rag_core::RagError;

/// Combined fingerprint of `paths`, hex encoded.
///
/// # Errors
///
/// [`RagError::Input`] if any path is missing or unreadable. Every path is
/// checked before any file is hashed.
pub fn fingerprint<P: AsRef<Path>>(paths: &[P]) -> Result<String, RagError> {
    if paths.is_empty() {
        return Err(RagError::input("no source documents given"));
    }
    for path in paths {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RagError::input(format!(
                "source file not found: {}",
                path.display()
            )));
        }
    }

    let mut combined = Sha256::new();
    for path in paths {
        let digest = file_digest(path.as_ref())?;
        combined.update(digest.as_bytes());
        combined.update(b"\n");
    }
    Ok(format!("{:x}", combined.finalize()))
}

/// SHA-256 of one file's bytes, hex encoded.
pub fn file_digest(path: &Path) -> Result<String, RagError> {
    let file = File::open(path).map_err(|e| {
        RagError::input(format!("cannot read source file {}: {}", path.display(), e))
    })?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(|e| {
            RagError::input(format!("cannot read source file {}: {}", path.display(), e))
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn stable_for_unchanged_file() {
        let tmp = TempDir::new().unwrap();
        let f = tmp.path().join("a.pdf");
        fs::write(&f, b"%PDF-1.4 same bytes").unwrap();
        assert_eq!(fingerprint(&[&f]).unwrap(), fingerprint(&[&f]).unwrap());
    }

    #[test]
    fn changes_with_one_byte() {
        let tmp = TempDir::new().unwrap();
        let f = tmp.path().join("a.pdf");
        fs::write(&f, b"%PDF-1.4 handbook v1").unwrap();
        let before = fingerprint(&[&f]).unwrap();
        fs::write(&f, b"%PDF-1.4 handbook v2").unwrap();
        assert_ne!(before, fingerprint(&[&f]).unwrap());
    }

    #[test]
    fn order_dependent() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.pdf");
        let b = tmp.path().join("b.pdf");
        fs::write(&a, b"alpha").unwrap();
        fs::write(&b, b"beta").unwrap();
        assert_ne!(fingerprint(&[&a, &b]).unwrap(), fingerprint(&[&b, &a]).unwrap());
    }

    #[test]
    fn missing_file_is_input_error() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.pdf");
        fs::write(&a, b"alpha").unwrap();
        let missing = tmp.path().join("missing.pdf");
        let err = fingerprint(&[&a, &missing]).unwrap_err();
        assert!(matches!(err, RagError::Input(ref m) if m.contains("missing.pdf")));
    }

    #[test]
    fn digest_matches_known_value() {
        let tmp = TempDir::new().unwrap();
        let f = tmp.path().join("abc.txt");
        fs::write(&f, b"abc").unwrap();
        assert_eq!(
            file_digest(&f).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn empty_path_list_rejected() {
        let none: [&Path; 0] = [];
        assert!(matches!(fingerprint(&none), Err(RagError::Input(_))));
    }
}
