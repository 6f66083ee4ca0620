#![allow(dead_code)]

pub mod folder_server;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use apphub_core::catalog::{Catalog, ManagedApplication};
use apphub_core::checksum;
use apphub_core::config::{StoreConfig, UpdaterConfig};
use apphub_core::fetcher::ContentStore;
use apphub_core::orchestrator::Updater;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// Scratch layout: `data/` (catalog + apps), `cache/`, `remote/`.
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::create_dir_all(dir.path().join("remote")).unwrap();
        Self { dir }
    }

    pub fn remote(&self) -> PathBuf {
        self.dir.path().join("remote")
    }

    pub fn config(&self, store: StoreConfig) -> UpdaterConfig {
        UpdaterConfig::with_dirs(
            &self.dir.path().join("data"),
            &self.dir.path().join("cache"),
            store,
        )
    }

    pub fn local_config(&self) -> UpdaterConfig {
        self.config(StoreConfig::Local {
            folder: self.remote(),
        })
    }

    pub fn updater(
        &self,
        cfg: UpdaterConfig,
        store: Arc<dyn ContentStore>,
        apps: Vec<ManagedApplication>,
    ) -> Arc<Updater> {
        let catalog = Catalog::create(&cfg.catalog_path, apps).unwrap();
        Arc::new(Updater::new(cfg, store, Arc::new(catalog)))
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha256_file(path: &Path) -> String {
    checksum::sha256_path(path).unwrap()
}

/// Zip archive bytes with the given `(name, body)` entries.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        for (name, body) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body).unwrap();
        }
        zip.finish().unwrap();
    }
    cursor.into_inner()
}

/// Manifest JSON in the `{"apps": [...]}` layout.
/// Entries: `(id, version, filename, hash)`, all archives.
pub fn manifest_json(entries: &[(&str, &str, &str, &str)]) -> String {
    let apps: Vec<serde_json::Value> = entries
        .iter()
        .map(|(id, version, filename, hash)| {
            serde_json::json!({
                "id": id,
                "name": id.to_uppercase(),
                "version": version,
                "package_kind": "archive",
                "filename": filename,
                "expected_hash": hash,
            })
        })
        .collect();
    serde_json::json!({ "apps": apps }).to_string()
}
