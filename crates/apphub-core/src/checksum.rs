//! Integrity verification: streaming SHA-256 over a downloaded package.
//!
//! A mismatch is always fatal to the download attempt; callers discard the
//! file and never install it.

use crate::error::{UpdateError, UpdateResult};
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Compute SHA-256 of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded; suitable for large files.
pub fn sha256_path(path: &Path) -> Result<String> {
    digest_file(path).with_context(|| format!("hash {}", path.display()))
}

fn digest_file(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Check `path` against `expected_hex` (case-insensitive, surrounding
/// whitespace ignored). Anything but an exact digest match is `HashMismatch`.
pub fn verify(path: &Path, expected_hex: &str) -> UpdateResult<()> {
    let actual =
        digest_file(path).map_err(|e| UpdateError::io(format!("hash {}", path.display()), e))?;
    let expected = expected_hex.trim().to_ascii_lowercase();
    if actual != expected {
        tracing::warn!(path = %path.display(), %expected, %actual, "checksum mismatch");
        return Err(UpdateError::HashMismatch {
            filename: display_name(path),
            expected,
            actual,
        });
    }
    tracing::debug!(path = %path.display(), "checksum verified");
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    const HELLO_SHA256: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let path = f.path();
        let digest = sha256_path(path).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_path_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let digest = sha256_path(f.path()).unwrap();
        assert_eq!(digest, HELLO_SHA256);
    }

    #[test]
    fn verify_is_case_insensitive() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        verify(f.path(), HELLO_SHA256).unwrap();
        verify(f.path(), &format!("  {}\n", HELLO_SHA256.to_uppercase())).unwrap();
    }

    #[test]
    fn verify_rejects_prefix_and_empty() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let err = verify(f.path(), &HELLO_SHA256[..32]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HashMismatch);
        assert_eq!(verify(f.path(), "").unwrap_err().kind(), ErrorKind::HashMismatch);
    }

    #[test]
    fn single_byte_flip_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.bin");
        let mut body: Vec<u8> = (0u8..=255).cycle().take(200 * 1024).collect();
        std::fs::write(&path, &body).unwrap();
        let original = sha256_path(&path).unwrap();

        for offset in [0usize, 1, BUF_SIZE - 1, BUF_SIZE, body.len() - 1] {
            body[offset] ^= 0x01;
            std::fs::write(&path, &body).unwrap();
            let err = verify(&path, &original).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::HashMismatch, "offset {offset}");
            body[offset] ^= 0x01;
        }
        std::fs::write(&path, &body).unwrap();
        verify(&path, &original).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify(&dir.path().join("absent"), HELLO_SHA256).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
