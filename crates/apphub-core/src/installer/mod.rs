//! Turns a verified package into a runnable installation under
//! `<apps_dir>/<app_id>/<version>/`.
//!
//! The installer never touches the catalog. Installing the same package twice
//! replaces the destination, so a crash between install and recording is
//! repaired by running the pipeline again.

mod archive;
mod exec;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{UpdateError, UpdateResult};
use crate::manifest::{is_plain_name, PackageKind};

pub use archive::{detect_format, ArchiveFormat};

#[derive(Debug, Clone)]
pub struct Installer {
    apps_dir: PathBuf,
    installer_args: Vec<String>,
}

impl Installer {
    pub fn new(apps_dir: impl Into<PathBuf>, installer_args: Vec<String>) -> Self {
        Self {
            apps_dir: apps_dir.into(),
            installer_args,
        }
    }

    pub fn apps_dir(&self) -> &Path {
        &self.apps_dir
    }

    /// Deterministic destination for one application version.
    pub fn install_dir(&self, app_id: &str, version: &str) -> PathBuf {
        self.apps_dir.join(app_id).join(version)
    }

    /// Install `package` for `app_id` at `version` and return the path later
    /// launches resolve to.
    pub fn install(
        &self,
        package: &Path,
        kind: PackageKind,
        app_id: &str,
        version: &str,
    ) -> UpdateResult<PathBuf> {
        for (what, value) in [("application id", app_id), ("version", version)] {
            if !is_plain_name(value) {
                return Err(UpdateError::Install {
                    path: package.to_path_buf(),
                    message: format!("{what} {value:?} cannot name an install directory"),
                });
            }
        }
        let dest = self.install_dir(app_id, version);
        tracing::info!(
            app_id,
            version,
            kind = kind.as_str(),
            package = %package.display(),
            dest = %dest.display(),
            "installing"
        );
        match kind {
            PackageKind::Archive => archive::install_archive(package, &dest)?,
            PackageKind::Installer => exec::run_installer(package, &dest, &self.installer_args)?,
        }
        tracing::info!(app_id, version, dest = %dest.display(), "installed");
        Ok(dest)
    }

    /// Remove every entry under `<apps_dir>/<app_id>` except `keep_version`.
    /// Returns how many entries were removed.
    pub fn prune_other_versions(&self, app_id: &str, keep_version: &str) -> io::Result<usize> {
        let app_dir = self.apps_dir.join(app_id);
        let entries = match fs::read_dir(&app_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut removed = 0;
        for entry in entries {
            let entry = entry?;
            if entry.file_name() == keep_version {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
            tracing::debug!(app_id, path = %path.display(), "removed previous install");
            removed += 1;
        }
        Ok(removed)
    }
}

/// Swap a fully prepared `staged` directory into `dest`, replacing any
/// previous content.
pub(crate) fn replace_dir(staged: &Path, dest: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::rename(staged, dest)
}
