//! Sequential `.part` writer with atomic finalize.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

const WRITE_BUF: usize = 256 * 1024;

/// Path for the temp file: appends `.part` to the final path (e.g. `app.zip` → `app.zip.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(".part");
    PathBuf::from(o)
}

/// Temp download file next to its destination. Removed on drop unless
/// `commit` succeeded.
pub(crate) struct PartFile {
    writer: Option<BufWriter<File>>,
    temp_path: PathBuf,
    written: u64,
}

impl PartFile {
    /// Create (or truncate) `<final_path>.part`, creating parent directories.
    pub(crate) fn create(final_path: &Path) -> io::Result<Self> {
        if let Some(parent) = final_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp_path = temp_path(final_path);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        Ok(Self {
            writer: Some(BufWriter::with_capacity(WRITE_BUF, file)),
            temp_path,
            written: 0,
        })
    }

    pub(crate) fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("part file already committed"))?;
        writer.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    pub(crate) fn written(&self) -> u64 {
        self.written
    }

    /// Flush, sync and rename onto `final_path`, replacing any existing file.
    pub(crate) fn commit(mut self, final_path: &Path) -> io::Result<u64> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&self.temp_path, final_path)?;
        self.temp_path = PathBuf::new();
        Ok(self.written)
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        drop(self.writer.take());
        if !self.temp_path.as_os_str().is_empty() {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.temp_path.display(), "could not remove partial download: {}", e);
                }
            }
        }
    }
}
