//! Transfer error type used for retry classification.

use crate::error::UpdateError;
use std::fmt;

/// Error from one fetch attempt (curl failure, HTTP status, missing object,
/// or local write failure). Classified before it becomes an `UpdateError`.
#[derive(Debug)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, TLS, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// The folder listing has no object with this exact name.
    Missing,
    /// Response body could not be understood (e.g. a listing that is not JSON).
    Protocol(String),
    /// Disk write failed (disk full, permission denied). Not retried.
    Storage(std::io::Error),
}

impl TransferError {
    /// Map onto the pipeline taxonomy: missing objects are `NotFound`, local
    /// write failures are `Io`, everything else on the wire is `Network`.
    pub fn into_update_error(self, filename: &str, folder: &str) -> UpdateError {
        match self {
            TransferError::Missing => UpdateError::NotFound {
                filename: filename.to_string(),
                folder: folder.to_string(),
            },
            TransferError::Http(404) | TransferError::Http(410) => UpdateError::NotFound {
                filename: filename.to_string(),
                folder: folder.to_string(),
            },
            TransferError::Storage(e) => UpdateError::io(format!("write '{filename}'"), e),
            other => UpdateError::Network {
                filename: filename.to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Curl(e) => write!(f, "{}", e),
            TransferError::Http(code) => write!(f, "HTTP {}", code),
            TransferError::Missing => write!(f, "no object with that name"),
            TransferError::Protocol(msg) => write!(f, "unexpected response: {}", msg),
            TransferError::Storage(e) => write!(f, "storage: {}", e),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Curl(e) => Some(e),
            TransferError::Storage(e) => Some(e),
            TransferError::Http(_) | TransferError::Missing | TransferError::Protocol(_) => None,
        }
    }
}
