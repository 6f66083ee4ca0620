use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Name of the manifest in the remote folder unless configured otherwise.
pub const DEFAULT_MANIFEST_FILENAME: &str = "app_version.json";

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per fetch (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let p = RetryPolicy::default();
        Self {
            max_attempts: p.max_attempts,
            base_delay_secs: p.base_delay.as_secs_f64(),
            max_delay_secs: p.max_delay.as_secs(),
        }
    }
}

impl RetryConfig {
    /// Fails when `base_delay_secs` is negative, not finite, or too large for a `Duration`.
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        let base_delay = Duration::try_from_secs_f64(self.base_delay_secs)
            .with_context(|| format!("retry.base_delay_secs = {} is not a valid delay", self.base_delay_secs))?;
        Ok(RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(self.max_delay_secs),
        })
    }
}

/// Where packages and the manifest live. Files are always addressed by their
/// exact name inside one folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Google Drive folder read through the v3 API with an API key.
    Drive {
        /// Folder id, or a folder URL containing `/folders/<id>`.
        folder: String,
        api_key: String,
        #[serde(default)]
        api_base: Option<String>,
    },
    /// Plain HTTP(S) folder: `<base_url>/<folder>/<filename>`.
    Http { base_url: String, folder: String },
    /// Directory on a local or mounted filesystem.
    Local { folder: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Drive {
            folder: String::new(),
            api_key: String::new(),
            api_base: None,
        }
    }
}

/// Update engine configuration loaded from `~/.config/apphub/config.toml`.
///
/// Passed explicitly to the updater; tests build one pointing at scratch
/// directories and a fake store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Fixed name of the manifest in the remote folder.
    #[serde(default = "default_manifest_filename")]
    pub manifest_filename: String,
    /// Local catalog file (applications, installed versions and paths).
    pub catalog_path: PathBuf,
    /// Root under which applications are installed (`<apps_dir>/<id>/<version>`).
    pub apps_dir: PathBuf,
    /// Scratch directory for in-flight downloads.
    pub cache_dir: PathBuf,
    /// Connect timeout for every remote request.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound for one whole transfer (manifest or package).
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
    /// How many application pipelines of one batch may run at once.
    #[serde(default = "default_max_concurrent_updates")]
    pub max_concurrent_updates: usize,
    /// Arguments passed to installer executables (e.g. a silent-install flag).
    #[serde(default)]
    pub installer_args: Vec<String>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    pub store: StoreConfig,
}

fn default_manifest_filename() -> String {
    DEFAULT_MANIFEST_FILENAME.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_transfer_timeout_secs() -> u64 {
    30 * 60
}

fn default_max_concurrent_updates() -> usize {
    2
}

impl UpdaterConfig {
    /// Config with default tunables: catalog and installs under `data_dir`,
    /// downloads under `cache_dir`.
    pub fn with_dirs(data_dir: &Path, cache_dir: &Path, store: StoreConfig) -> Self {
        Self {
            manifest_filename: default_manifest_filename(),
            catalog_path: data_dir.join("appconfig.json"),
            apps_dir: data_dir.join("apps"),
            cache_dir: cache_dir.to_path_buf(),
            connect_timeout_secs: default_connect_timeout_secs(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
            max_concurrent_updates: default_max_concurrent_updates(),
            installer_args: Vec::new(),
            retry: None,
            store,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        match &self.retry {
            Some(retry) => retry.to_policy(),
            None => Ok(RetryPolicy::default()),
        }
    }

    /// Reject configurations that cannot work before any request is made.
    pub fn validate(&self) -> Result<()> {
        if self.manifest_filename.trim().is_empty() {
            bail!("manifest_filename must not be empty");
        }
        self.retry_policy()?;
        match &self.store {
            StoreConfig::Drive { folder, api_key, .. } => {
                if folder.trim().is_empty() || api_key.trim().is_empty() {
                    bail!("store.folder and store.api_key must be set for the drive store");
                }
            }
            StoreConfig::Http { base_url, folder } => {
                url::Url::parse(base_url)
                    .with_context(|| format!("store.base_url is not a URL: {base_url}"))?;
                if folder.trim().is_empty() {
                    bail!("store.folder must be set for the http store");
                }
            }
            StoreConfig::Local { folder } => {
                if folder.as_os_str().is_empty() {
                    bail!("store.folder must be set for the local store");
                }
            }
        }
        Ok(())
    }
}

fn xdg_dirs() -> Result<xdg::BaseDirectories> {
    Ok(xdg::BaseDirectories::with_prefix("apphub")?)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(xdg_dirs()?.place_config_file("config.toml")?)
}

/// Default config rooted in the XDG data and cache directories.
pub fn default_config() -> Result<UpdaterConfig> {
    let dirs = xdg_dirs()?;
    Ok(UpdaterConfig::with_dirs(
        &dirs.get_data_home(),
        &dirs.get_cache_home().join("packages"),
        StoreConfig::default(),
    ))
}

/// Load configuration from `path`.
pub fn load_from(path: &Path) -> Result<UpdaterConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: UpdaterConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<UpdaterConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = default_config()?;
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}
