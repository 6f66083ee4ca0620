//! Remote manifest: one entry per managed application.
//!
//! Parsing is all-or-nothing. A malformed document or a single bad entry
//! fails the whole manifest, since applying half of it could pair the wrong
//! version with the wrong package.

use crate::error::{UpdateError, UpdateResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// How a downloaded package turns into an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PackageKind {
    /// Container that is extracted into the install directory.
    #[default]
    Archive,
    /// Self-installing executable, run as an external process.
    Installer,
}

impl PackageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageKind::Archive => "archive",
            PackageKind::Installer => "installer",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageKind {
    type Err = String;

    /// Accepts the kind names and the legacy file-type tags (`zip`, `rar`, `exe`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "archive" | "zip" | "rar" | "7z" | "tar.gz" | "tgz" => Ok(PackageKind::Archive),
            "installer" | "installer-executable" | "installer_executable" | "exe" | "msi" => {
                Ok(PackageKind::Installer)
            }
            other => Err(format!("unknown package kind '{other}'")),
        }
    }
}

impl Serialize for PackageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PackageKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One row of the remote manifest. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteManifestEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(alias = "file_type")]
    pub package_kind: PackageKind,
    /// Exact, case-sensitive name of the package in the remote folder.
    pub filename: String,
    /// Hex SHA-256 of the package bytes.
    #[serde(alias = "sha256")]
    pub expected_hash: String,
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    apps: Vec<RemoteManifestEntry>,
}

/// Parse a manifest document (`{"apps": [...]}`), preserving entry order.
pub fn parse_manifest(raw: &str) -> UpdateResult<Vec<RemoteManifestEntry>> {
    let doc: ManifestDocument =
        serde_json::from_str(raw).map_err(|e| UpdateError::ManifestParse(e.to_string()))?;

    let mut seen = HashSet::new();
    for (index, entry) in doc.apps.iter().enumerate() {
        validate_entry(entry).map_err(|reason| {
            UpdateError::ManifestParse(format!("entry {index} ('{}'): {reason}", entry.id))
        })?;
        if !seen.insert(entry.id.as_str()) {
            return Err(UpdateError::ManifestParse(format!(
                "duplicate id '{}' at entry {index}",
                entry.id
            )));
        }
    }
    Ok(doc.apps)
}

fn validate_entry(entry: &RemoteManifestEntry) -> Result<(), String> {
    if !is_plain_name(&entry.id) {
        return Err("id must be a non-empty plain name".to_string());
    }
    if !is_plain_name(&entry.filename) {
        return Err(format!("filename '{}' is not a plain file name", entry.filename));
    }
    if !is_sha256_hex(&entry.expected_hash) {
        return Err(format!(
            "expected hash '{}' is not a hex SHA-256 digest",
            entry.expected_hash
        ));
    }
    Ok(())
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Non-empty, no path separators, not `.`/`..`: safe to join under a local directory.
pub(crate) fn is_plain_name(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && !s.contains(['/', '\\', '\0'])
        && s.trim() == s
}
