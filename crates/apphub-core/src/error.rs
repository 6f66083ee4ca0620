//! Error taxonomy for the update pipeline.
//!
//! Every stage of a per-application pipeline fails with an `UpdateError`.
//! Outcomes and progress events carry the flattened `UpdateFailure` (tag +
//! human-readable cause) so the UI can offer a targeted retry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub type UpdateResult<T> = Result<T, UpdateError>;

/// Tag of an `UpdateError`, stable across the progress channel and JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Network,
    ManifestParse,
    HashMismatch,
    Extraction,
    Install,
    Catalog,
    Io,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Network => "network",
            ErrorKind::ManifestParse => "manifest_parse",
            ErrorKind::HashMismatch => "hash_mismatch",
            ErrorKind::Extraction => "extraction",
            ErrorKind::Install => "install",
            ErrorKind::Catalog => "catalog",
            ErrorKind::Io => "io",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// True when re-running the whole sequence later may succeed without any
    /// change on either side (network hiccup, cancelled batch).
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Cancelled)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// No object with this exact name exists in the remote folder.
    #[error("'{filename}' not found in remote folder '{folder}'")]
    NotFound { filename: String, folder: String },

    /// Transport-level fault (timeout, DNS, auth, quota, 5xx).
    #[error("network error while fetching '{filename}': {message}")]
    Network { filename: String, message: String },

    #[error("malformed manifest: {0}")]
    ManifestParse(String),

    #[error("hash mismatch for '{filename}': expected {expected}, got {actual}")]
    HashMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    #[error("cannot extract {}: {message}", .path.display())]
    Extraction { path: PathBuf, message: String },

    #[error("installer {} failed: {message}", .path.display())]
    Install { path: PathBuf, message: String },

    #[error("catalog update failed: {0}")]
    Catalog(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("update cancelled before it started")]
    Cancelled,
}

impl UpdateError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        UpdateError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UpdateError::NotFound { .. } => ErrorKind::NotFound,
            UpdateError::Network { .. } => ErrorKind::Network,
            UpdateError::ManifestParse(_) => ErrorKind::ManifestParse,
            UpdateError::HashMismatch { .. } => ErrorKind::HashMismatch,
            UpdateError::Extraction { .. } => ErrorKind::Extraction,
            UpdateError::Install { .. } => ErrorKind::Install,
            UpdateError::Catalog(_) => ErrorKind::Catalog,
            UpdateError::Io { .. } => ErrorKind::Io,
            UpdateError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Failure as reported to the UI: taxonomy tag plus a readable cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&UpdateError> for UpdateFailure {
    fn from(e: &UpdateError) -> Self {
        UpdateFailure {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<UpdateError> for UpdateFailure {
    fn from(e: UpdateError) -> Self {
        UpdateFailure::from(&e)
    }
}

impl fmt::Display for UpdateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
