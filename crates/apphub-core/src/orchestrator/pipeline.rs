//! One application's sequence. Strictly sequential; any stage failure ends
//! the pipeline at `Done { ok: false }` with no retry across stages.

use std::fs;
use std::path::{Path, PathBuf};

use super::outcome::UpdateOutcome;
use super::state::{EventSink, PipelineState};
use super::Updater;
use crate::checksum;
use crate::error::{UpdateError, UpdateFailure, UpdateResult};
use crate::version;
use crate::version_manager::UpdateCandidate;

/// Minimum byte step between two transfer events for one download.
const TRANSFER_EVENT_STEP: u64 = 256 * 1024;

/// Removes the cached package when the pipeline ends, whatever the outcome.
struct CachedPackage(PathBuf);

impl Drop for CachedPackage {
    fn drop(&mut self) {
        match fs::remove_file(&self.0) {
            Ok(()) => tracing::debug!(path = %self.0.display(), "removed cached package"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.0.display(), error = %e, "could not remove cached package"),
        }
        if let Some(dir) = self.0.parent() {
            let _ = fs::remove_dir(dir);
        }
    }
}

impl Updater {
    /// Run one candidate to completion. Blocking: network, hashing,
    /// extraction and installer processes all happen on the calling thread.
    pub fn run_pipeline(&self, candidate: &UpdateCandidate, events: &EventSink) -> UpdateOutcome {
        let app_id = candidate.app_id();
        let span = tracing::info_span!("pipeline", app_id, version = %candidate.entry.version);
        let _enter = span.enter();

        match self.run_stages(candidate, events) {
            Ok(outcome) => {
                tracing::info!(?outcome, "pipeline finished");
                events.state(app_id, PipelineState::Done { ok: true }, None);
                outcome
            }
            Err(e) => {
                let failure = UpdateFailure::from(&e);
                tracing::warn!(error = %e, kind = %failure.kind, "pipeline failed");
                events.state(app_id, PipelineState::Done { ok: false }, Some(failure.clone()));
                UpdateOutcome::Failed(failure)
            }
        }
    }

    fn run_stages(&self, candidate: &UpdateCandidate, events: &EventSink) -> UpdateResult<UpdateOutcome> {
        let app_id = candidate.app_id();
        let entry = &candidate.entry;

        events.state(app_id, PipelineState::Checking, None);
        // The catalog may have moved since the check that produced this
        // candidate (another batch, a re-run after a crash).
        let current = self
            .catalog
            .get(app_id)
            .ok_or_else(|| UpdateError::Catalog(format!("application '{app_id}' is not in the catalog")))?;
        if !version::is_newer(&entry.version, &current.version) {
            tracing::info!(current = %current.version, "already at or past manifest version");
            return Ok(UpdateOutcome::UpToDate);
        }

        events.state(app_id, PipelineState::Downloading, None);
        let package = self.package_path(app_id, &entry.filename);
        let _cleanup = CachedPackage(package.clone());
        let mut last_reported = 0u64;
        self.store.fetch(&entry.filename, &package, &mut |bytes, total| {
            let finished = total.is_some_and(|t| bytes >= t);
            if bytes >= last_reported + TRANSFER_EVENT_STEP || finished {
                last_reported = bytes;
                events.transfer(app_id, bytes, total);
            }
        })?;

        events.state(app_id, PipelineState::Verifying, None);
        checksum::verify(&package, &entry.expected_hash)?;

        events.state(app_id, PipelineState::Installing, None);
        let local_path = self
            .installer
            .install(&package, entry.package_kind, app_id, &entry.version)?;

        events.state(app_id, PipelineState::Recording, None);
        self.catalog.record_install(app_id, &entry.version, &local_path)?;

        match self.installer.prune_other_versions(app_id, &entry.version) {
            Ok(0) => {}
            Ok(n) => tracing::info!(removed = n, "removed previous installs"),
            Err(e) => tracing::warn!(error = %e, "could not remove previous installs"),
        }
        Ok(UpdateOutcome::Updated(entry.version.clone()))
    }

    /// `<cache_dir>/<app_id>/<filename>`: named by the manifest filename, one
    /// directory per application so two pipelines never share a file.
    fn package_path(&self, app_id: &str, filename: &str) -> PathBuf {
        cache_entry(&self.cfg.cache_dir, app_id, filename)
    }
}

fn cache_entry(cache_dir: &Path, app_id: &str, filename: &str) -> PathBuf {
    cache_dir.join(app_id).join(filename)
}
