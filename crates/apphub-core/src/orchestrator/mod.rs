//! Update orchestrator: drives each candidate through
//! check, download, verify, install and record, and runs batches of them.
//!
//! Pipelines are blocking and run on the blocking pool; a batch is an async
//! task that keeps up to `max_concurrent_updates` of them in flight.

mod batch;
mod outcome;
mod pipeline;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::catalog::Catalog;
use crate::config::UpdaterConfig;
use crate::error::UpdateResult;
use crate::fetcher::{store_from_config, ContentStore};
use crate::installer::Installer;
use crate::version_manager::{CheckReport, VersionManager};

pub use batch::BatchControl;
pub use outcome::{BatchSummary, FailedApp, UpdateOutcome, UpdatedApp};
pub use state::{EventSink, PipelineState, ProgressEvent};

pub struct Updater {
    cfg: UpdaterConfig,
    store: Arc<dyn ContentStore>,
    catalog: Arc<Catalog>,
    installer: Installer,
    versions: VersionManager,
}

impl Updater {
    /// Build from explicit parts, so tests can substitute the store.
    pub fn new(cfg: UpdaterConfig, store: Arc<dyn ContentStore>, catalog: Arc<Catalog>) -> Self {
        let installer = Installer::new(&cfg.apps_dir, cfg.installer_args.clone());
        let versions =
            VersionManager::new(Arc::clone(&store), &cfg.manifest_filename, &cfg.cache_dir);
        Self {
            cfg,
            store,
            catalog,
            installer,
            versions,
        }
    }

    /// Store from `cfg.store`, catalog loaded from `cfg.catalog_path`.
    pub fn from_config(cfg: UpdaterConfig) -> Result<Self> {
        let store = store_from_config(&cfg)?;
        let catalog = Catalog::load(&cfg.catalog_path)
            .with_context(|| format!("load catalog {}", cfg.catalog_path.display()))?;
        Ok(Self::new(cfg, store, Arc::new(catalog)))
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.cfg
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    /// Fetch the manifest and diff it against the current catalog.
    pub fn check(&self) -> UpdateResult<CheckReport> {
        let manifest = self.versions.fetch_manifest()?;
        let report = CheckReport::build(&self.catalog.apps(), &manifest);
        tracing::info!(
            candidates = report.candidates.len(),
            up_to_date = report.up_to_date.len(),
            "update check complete"
        );
        Ok(report)
    }
}
