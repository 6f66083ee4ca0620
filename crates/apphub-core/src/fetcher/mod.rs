//! Content fetcher: resolve a filename inside one remote folder and stream
//! its bytes to a local path.
//!
//! Remote identity is the exact, case-sensitive filename; no per-file id is
//! kept between calls. Bodies are streamed through a `.part` file and only
//! renamed onto the destination once complete, so a failed or interrupted
//! transfer never leaves a file at the destination path. A file at the
//! destination says nothing about integrity; verification is a separate step.

mod drive;
mod http;
mod local;
mod part;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::{StoreConfig, UpdaterConfig};
use crate::error::UpdateResult;
use crate::retry::RetryPolicy;

pub use drive::{extract_folder_id, DriveFolderStore, DEFAULT_DRIVE_API};
pub use http::HttpFolderStore;
pub use local::LocalFolderStore;
pub use part::temp_path;

/// Byte progress callback: `(bytes_received, total_if_known)`.
pub type TransferProgress<'a> = &'a mut dyn FnMut(u64, Option<u64>);

/// A remote folder whose files are fetched by exact name.
pub trait ContentStore: Send + Sync {
    /// Identifier of the folder, used in messages.
    fn folder(&self) -> &str;

    /// Fetch `filename` into `dest`, overwriting whatever is there.
    /// Returns the number of bytes written.
    ///
    /// Fails with `NotFound` when the folder has no object with that exact
    /// name, and with `Network` for transport faults.
    fn fetch(&self, filename: &str, dest: &Path, progress: TransferProgress<'_>) -> UpdateResult<u64>;
}

/// Network bounds applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    /// Limit for one whole fetch, retries included; on expiry the fetch fails
    /// with `Network`.
    pub transfer: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            transfer: Duration::from_secs(30 * 60),
        }
    }
}

/// Build the store described by `cfg.store`.
pub fn store_from_config(cfg: &UpdaterConfig) -> Result<Arc<dyn ContentStore>> {
    cfg.validate()?;
    let timeouts = Timeouts {
        connect: cfg.connect_timeout(),
        transfer: cfg.transfer_timeout(),
    };
    let retry: RetryPolicy = cfg.retry_policy()?;
    let store: Arc<dyn ContentStore> = match &cfg.store {
        StoreConfig::Drive {
            folder,
            api_key,
            api_base,
        } => Arc::new(
            DriveFolderStore::new(
                api_base.as_deref().unwrap_or(DEFAULT_DRIVE_API),
                folder,
                api_key,
                timeouts,
                retry,
            )
            .context("configure drive store")?,
        ),
        StoreConfig::Http { base_url, folder } => Arc::new(
            HttpFolderStore::new(base_url, folder, timeouts, retry)
                .context("configure http store")?,
        ),
        StoreConfig::Local { folder } => Arc::new(LocalFolderStore::new(folder)),
    };
    tracing::debug!(folder = store.folder(), "content store ready");
    Ok(store)
}
