//! Remote manifest retrieval and the catalog/manifest diff.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::ManagedApplication;
use crate::error::{UpdateError, UpdateResult};
use crate::fetcher::ContentStore;
use crate::manifest::{parse_manifest, RemoteManifestEntry};
use crate::version;

/// An application whose manifest version is newer than its catalog version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateCandidate {
    pub app: ManagedApplication,
    pub entry: RemoteManifestEntry,
}

impl UpdateCandidate {
    pub fn app_id(&self) -> &str {
        &self.app.id
    }
}

/// Result of one check: what to update and which catalog ids are current.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CheckReport {
    pub candidates: Vec<UpdateCandidate>,
    pub up_to_date: Vec<String>,
}

impl CheckReport {
    pub fn build(catalog: &[ManagedApplication], manifest: &[RemoteManifestEntry]) -> Self {
        let candidates = diff(catalog, manifest);
        let up_to_date = catalog
            .iter()
            .filter(|app| !candidates.iter().any(|c| c.app.id == app.id))
            .map(|app| app.id.clone())
            .collect();
        Self {
            candidates,
            up_to_date,
        }
    }

    /// Keep only candidates whose id is in `ids`; empty `ids` keeps all.
    pub fn retain_ids(&mut self, ids: &[String]) {
        if !ids.is_empty() {
            self.candidates.retain(|c| ids.iter().any(|id| id == &c.app.id));
        }
    }
}

pub struct VersionManager {
    store: Arc<dyn ContentStore>,
    manifest_filename: String,
    cache_dir: PathBuf,
}

impl VersionManager {
    pub fn new(
        store: Arc<dyn ContentStore>,
        manifest_filename: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            manifest_filename: manifest_filename.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Download and parse the manifest. Any malformed entry fails the whole
    /// fetch. The downloaded copy is removed before returning.
    pub fn fetch_manifest(&self) -> UpdateResult<Vec<RemoteManifestEntry>> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            UpdateError::io(format!("create cache dir {}", self.cache_dir.display()), e)
        })?;
        // Private scratch dir so concurrent checks never share a file.
        let scratch = tempfile::Builder::new()
            .prefix(".manifest-")
            .tempdir_in(&self.cache_dir)
            .map_err(|e| UpdateError::io("create manifest scratch dir", e))?;
        let dest = scratch.path().join(&self.manifest_filename);

        self.store
            .fetch(&self.manifest_filename, &dest, &mut |_, _| {})?;
        let bytes = fs::read(&dest)
            .map_err(|e| UpdateError::io(format!("read {}", dest.display()), e))?;
        let raw = String::from_utf8(bytes)
            .map_err(|_| UpdateError::ManifestParse("manifest is not valid UTF-8".to_string()))?;
        let entries = parse_manifest(raw.trim_start_matches('\u{feff}'))?;
        tracing::info!(
            filename = %self.manifest_filename,
            folder = self.store.folder(),
            entries = entries.len(),
            "manifest fetched"
        );
        Ok(entries)
    }
}

/// Candidates in manifest order. Pure: manifest ids absent from the catalog
/// are ignored, catalog apps absent from the manifest are simply not listed.
pub fn diff(catalog: &[ManagedApplication], manifest: &[RemoteManifestEntry]) -> Vec<UpdateCandidate> {
    let by_id: HashMap<&str, &ManagedApplication> =
        catalog.iter().map(|app| (app.id.as_str(), app)).collect();
    manifest
        .iter()
        .filter_map(|entry| {
            let app = by_id.get(entry.id.as_str())?;
            version::is_newer(&entry.version, &app.version).then(|| UpdateCandidate {
                app: (*app).clone(),
                entry: entry.clone(),
            })
        })
        .collect()
}
