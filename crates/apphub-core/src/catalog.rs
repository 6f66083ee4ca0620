//! Local catalog: the managed applications, their installed version and path.
//!
//! The catalog file is shared by every pipeline of a batch, so writes go
//! through a single lock and land on disk atomically (temp file + rename).
//! Fields the update engine does not own (launcher hints, icons, ...) are
//! carried through untouched.

use crate::error::{UpdateError, UpdateResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Key under which an entry stores its installed path. The launcher reads
/// `local_exe`; `local_path` is accepted too and written back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathKey {
    #[default]
    LocalExe,
    LocalPath,
}

impl PathKey {
    pub fn as_str(self) -> &'static str {
        match self {
            PathKey::LocalExe => "local_exe",
            PathKey::LocalPath => "local_path",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredApplication", into = "StoredApplication")]
pub struct ManagedApplication {
    pub id: String,
    pub name: String,
    /// Locally installed version; empty or unparsable sorts below any release.
    pub version: String,
    /// Installed artifact, or the bundled fallback until the first update.
    pub local_path: Option<PathBuf>,
    /// Key `local_path` is read from and written back to.
    pub path_key: PathKey,
    pub extra: Map<String, Value>,
}

impl ManagedApplication {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            local_path: None,
            path_key: PathKey::default(),
            extra: Map::new(),
        }
    }
}

/// On-disk shape of one entry.
#[derive(Serialize, Deserialize)]
struct StoredApplication {
    id: String,
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local_exe: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local_path: Option<PathBuf>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<StoredApplication> for ManagedApplication {
    fn from(stored: StoredApplication) -> Self {
        let mut extra = stored.extra;
        let (path_key, local_path) = match (stored.local_exe, stored.local_path) {
            (Some(exe), other) => {
                // Both keys present: `local_exe` is managed, the other is carried as-is.
                if let Some(other) = other {
                    extra.insert(
                        PathKey::LocalPath.as_str().to_string(),
                        Value::from(other.to_string_lossy().into_owned()),
                    );
                }
                (PathKey::LocalExe, Some(exe))
            }
            (None, Some(path)) => (PathKey::LocalPath, Some(path)),
            (None, None) => (PathKey::default(), None),
        };
        Self {
            id: stored.id,
            name: stored.name,
            version: stored.version,
            local_path,
            path_key,
            extra,
        }
    }
}

impl From<ManagedApplication> for StoredApplication {
    fn from(app: ManagedApplication) -> Self {
        let mut extra = app.extra;
        let (local_exe, local_path) = match app.path_key {
            PathKey::LocalExe => (app.local_path, None),
            PathKey::LocalPath => (None, app.local_path),
        };
        // The managed key always wins over a carried copy of the same name.
        if local_exe.is_some() || local_path.is_some() {
            extra.remove(app.path_key.as_str());
        }
        Self {
            id: app.id,
            name: app.name,
            version: app.version,
            local_exe,
            local_path,
            extra,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    apps: Vec<ManagedApplication>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Catalog file plus its in-memory copy.
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    doc: Mutex<CatalogDocument>,
}

impl Catalog {
    /// Load the catalog at `path`.
    pub fn load(path: &Path) -> UpdateResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| UpdateError::io(format!("read catalog {}", path.display()), e))?;
        let doc: CatalogDocument = serde_json::from_str(&raw)
            .map_err(|e| UpdateError::Catalog(format!("parse {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), apps = doc.apps.len(), "loaded catalog");
        Ok(Self {
            path: path.to_path_buf(),
            doc: Mutex::new(doc),
        })
    }

    /// Write a fresh catalog containing `apps` and return it.
    pub fn create(path: &Path, apps: Vec<ManagedApplication>) -> UpdateResult<Self> {
        let catalog = Self {
            path: path.to_path_buf(),
            doc: Mutex::new(CatalogDocument {
                apps,
                extra: Map::new(),
            }),
        };
        {
            let doc = catalog.doc.lock().unwrap_or_else(PoisonError::into_inner);
            write_document(&catalog.path, &doc)?;
        }
        Ok(catalog)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of all applications, in file order.
    pub fn apps(&self) -> Vec<ManagedApplication> {
        self.doc
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apps
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<ManagedApplication> {
        self.doc
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apps
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    /// Record a successful install: new version and path for `id`, persisted
    /// before returning. Holds the catalog lock across the file write so
    /// concurrent pipelines never interleave partial documents.
    pub fn record_install(&self, id: &str, version: &str, local_path: &Path) -> UpdateResult<()> {
        let mut doc = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
        let app = doc
            .apps
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| UpdateError::Catalog(format!("application '{id}' is not in the catalog")))?;
        let previous = std::mem::replace(&mut app.version, version.to_string());
        let previous_path = app.local_path.replace(local_path.to_path_buf());

        if let Err(e) = write_document(&self.path, &doc) {
            // Keep memory consistent with what is on disk.
            if let Some(app) = doc.apps.iter_mut().find(|a| a.id == id) {
                app.version = previous;
                app.local_path = previous_path;
            }
            return Err(e);
        }
        tracing::info!(app_id = id, version, path = %local_path.display(), "catalog updated");
        Ok(())
    }
}

fn write_document(path: &Path, doc: &CatalogDocument) -> UpdateResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)
        .map_err(|e| UpdateError::Catalog(format!("create {}: {}", dir.display(), e)))?;
    let raw = serde_json::to_string_pretty(doc)
        .map_err(|e| UpdateError::Catalog(format!("serialize catalog: {e}")))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .map_err(|e| UpdateError::Catalog(format!("stage catalog in {}: {}", dir.display(), e)))?;
    tmp.write_all(raw.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| UpdateError::Catalog(format!("write catalog: {e}")))?;
    tmp.persist(path)
        .map_err(|e| UpdateError::Catalog(format!("replace {}: {}", path.display(), e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_install_keeps_launcher_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appconfig.json");
        fs::write(
            &path,
            r#"{"theme": "dark", "apps": [
                {"id": "x", "name": "X", "version": "1.0.0", "local_exe": "X_v1/x.exe", "icon": "x.png"},
                {"id": "y", "name": "Y"},
                {"id": "z", "name": "Z", "version": "2.0.0", "local_path": "Z/z.exe", "file_type": "rar"}
            ]}"#,
        )
        .unwrap();

        let catalog = Catalog::load(&path).unwrap();
        let apps = catalog.apps();
        assert_eq!(apps.len(), 3);
        assert_eq!(apps[0].local_path.as_deref(), Some(Path::new("X_v1/x.exe")));
        assert_eq!(apps[0].path_key, PathKey::LocalExe);
        assert_eq!(apps[0].extra.get("icon"), Some(&Value::from("x.png")));
        assert_eq!(apps[1].version, "");
        assert_eq!(apps[2].path_key, PathKey::LocalPath);

        catalog
            .record_install("x", "1.0.1", Path::new("/opt/apps/x/1.0.1"))
            .unwrap();
        catalog
            .record_install("z", "2.1.0", Path::new("/opt/apps/z/2.1.0"))
            .unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        let reparsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(reparsed["theme"], "dark");

        let x = reparsed["apps"][0].as_object().unwrap();
        assert_eq!(x["local_exe"], "/opt/apps/x/1.0.1");
        assert_eq!(x["version"], "1.0.1");
        assert_eq!(x["icon"], "x.png");
        let mut keys: Vec<_> = x.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["icon", "id", "local_exe", "name", "version"]);

        let y = reparsed["apps"][1].as_object().unwrap();
        assert_eq!(y.len(), 2, "untouched entry gains no keys: {y:?}");

        let z = reparsed["apps"][2].as_object().unwrap();
        assert_eq!(z["local_path"], "/opt/apps/z/2.1.0");
        assert_eq!(z["file_type"], "rar");
        assert!(!z.contains_key("local_exe"));
    }

    #[test]
    fn both_path_keys_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("appconfig.json");
        fs::write(
            &path,
            r#"{"apps": [{"id": "x", "name": "X", "local_exe": "a.exe", "local_path": "b"}]}"#,
        )
        .unwrap();
        let catalog = Catalog::load(&path).unwrap();
        catalog.record_install("x", "1.0.1", Path::new("/apps/x/1.0.1")).unwrap();

        let reparsed: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(reparsed["apps"][0]["local_exe"], "/apps/x/1.0.1");
        assert_eq!(reparsed["apps"][0]["local_path"], "b");
    }

    #[test]
    fn record_install_unknown_id_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let catalog = Catalog::create(&path, vec![ManagedApplication::new("x", "X", "1.0.0")]).unwrap();
        let err = catalog
            .record_install("nope", "2.0.0", Path::new("/tmp/nope"))
            .unwrap_err();
        assert!(matches!(err, UpdateError::Catalog(_)));
        assert_eq!(catalog.get("x").unwrap().version, "1.0.0");
    }

    #[test]
    fn concurrent_records_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let apps = (0..8)
            .map(|i| ManagedApplication::new(format!("app{i}"), format!("App {i}"), "1.0.0"))
            .collect();
        let catalog = std::sync::Arc::new(Catalog::create(&path, apps).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let catalog = std::sync::Arc::clone(&catalog);
                std::thread::spawn(move || {
                    let id = format!("app{i}");
                    catalog
                        .record_install(&id, "2.0.0", &PathBuf::from(format!("/apps/{id}")))
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let reloaded = Catalog::load(&path).unwrap();
        assert!(reloaded.apps().iter().all(|a| a.version == "2.0.0"));
    }
}
