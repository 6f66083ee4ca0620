//! Folder on a local or mounted filesystem (network share, USB mirror, tests).

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use super::part::PartFile;
use super::{ContentStore, TransferProgress};
use crate::error::{UpdateError, UpdateResult};

const COPY_BUF: usize = 256 * 1024;

#[derive(Debug, Clone)]
pub struct LocalFolderStore {
    dir: PathBuf,
    label: String,
}

impl LocalFolderStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            label: dir.display().to_string(),
        }
    }

    /// Exact-name lookup. Listing the directory instead of probing
    /// `dir.join(name)` keeps matching case-sensitive on case-insensitive
    /// filesystems.
    fn resolve(&self, filename: &str) -> UpdateResult<Option<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| UpdateError::Network {
            filename: filename.to_string(),
            message: format!("folder {} unavailable: {}", self.label, e),
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| UpdateError::Network {
                filename: filename.to_string(),
                message: format!("list {}: {}", self.label, e),
            })?;
            if entry.file_name().to_str() == Some(filename) && entry.path().is_file() {
                return Ok(Some(entry.path()));
            }
        }
        Ok(None)
    }
}

impl ContentStore for LocalFolderStore {
    fn folder(&self) -> &str {
        &self.label
    }

    fn fetch(&self, filename: &str, dest: &Path, progress: TransferProgress<'_>) -> UpdateResult<u64> {
        let source = self
            .resolve(filename)?
            .ok_or_else(|| UpdateError::NotFound {
                filename: filename.to_string(),
                folder: self.label.clone(),
            })?;
        tracing::info!(filename, source = %source.display(), "copying from local folder");

        let read_err = |e: std::io::Error| UpdateError::Network {
            filename: filename.to_string(),
            message: format!("read {}: {}", source.display(), e),
        };
        let mut input = File::open(&source).map_err(read_err)?;
        let total = input.metadata().ok().map(|m| m.len());
        let mut part =
            PartFile::create(dest).map_err(|e| UpdateError::io(format!("create {}", dest.display()), e))?;

        let mut buf = vec![0u8; COPY_BUF];
        loop {
            let n = input.read(&mut buf).map_err(read_err)?;
            if n == 0 {
                break;
            }
            part.write(&buf[..n])
                .map_err(|e| UpdateError::io(format!("write {}", dest.display()), e))?;
            progress(part.written(), total);
        }
        let bytes = part
            .commit(dest)
            .map_err(|e| UpdateError::io(format!("finalize {}", dest.display()), e))?;
        tracing::info!(filename, bytes, dest = %dest.display(), "fetched");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn fetches_exact_name_with_progress() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let body: Vec<u8> = (0u8..200).cycle().take(COPY_BUF + 17).collect();
        fs::write(remote.path().join("x_1.0.1.pkg"), &body).unwrap();

        let store = LocalFolderStore::new(remote.path());
        let dest = local.path().join("cache").join("x_1.0.1.pkg");
        let mut seen = Vec::new();
        let n = store
            .fetch("x_1.0.1.pkg", &dest, &mut |done, total| seen.push((done, total)))
            .unwrap();
        assert_eq!(n, body.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), body);
        assert_eq!(seen.last(), Some(&(body.len() as u64, Some(body.len() as u64))));
    }

    #[test]
    fn different_case_is_not_found() {
        let remote = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        fs::write(remote.path().join("Tool.zip"), b"x").unwrap();
        let store = LocalFolderStore::new(remote.path());
        let err = store
            .fetch("tool.zip", &local.path().join("tool.zip"), &mut |_, _| {})
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!local.path().join("tool.zip").exists());
    }

    #[test]
    fn unavailable_folder_is_network_error() {
        let local = tempfile::tempdir().unwrap();
        let store = LocalFolderStore::new(&local.path().join("unmounted"));
        let err = store
            .fetch("a.zip", &local.path().join("a.zip"), &mut |_, _| {})
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
