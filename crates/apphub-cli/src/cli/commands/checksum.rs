//! `apphub checksum` – SHA-256 of a file, in the form manifests expect.

use anyhow::Result;
use apphub_core::checksum;
use std::path::Path;

pub async fn run_checksum(path: &Path) -> Result<()> {
    let owned = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || checksum::sha256_path(&owned)).await??;
    println!("{}  {}", digest, path.display());
    Ok(())
}
