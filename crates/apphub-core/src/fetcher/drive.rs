//! Google Drive folder store (Drive v3 API, API-key access).
//!
//! A filename is resolved with one `files.list` query scoped to the folder,
//! keeping only exact, case-sensitive name matches, then downloaded with
//! `files/<id>?alt=media`. The resolved id is used for that one download and
//! then forgotten.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use super::http::{with_segments, HttpClient};
use super::{ContentStore, Timeouts, TransferProgress};
use crate::error::UpdateResult;
use crate::retry::{RetryPolicy, TransferError};

pub const DEFAULT_DRIVE_API: &str = "https://www.googleapis.com/drive/v3";

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Debug, Clone)]
pub struct DriveFolderStore {
    api_base: Url,
    folder_id: String,
    api_key: String,
    client: HttpClient,
}

impl DriveFolderStore {
    /// `folder` may be a bare folder id or a folder URL.
    pub fn new(
        api_base: &str,
        folder: &str,
        api_key: &str,
        timeouts: Timeouts,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let api_base =
            Url::parse(api_base).with_context(|| format!("invalid Drive API base {api_base}"))?;
        Ok(Self {
            api_base,
            folder_id: extract_folder_id(folder),
            api_key: api_key.to_string(),
            client: HttpClient::new(timeouts, retry),
        })
    }

    fn list_url(&self, filename: &str) -> Result<Url, TransferError> {
        let mut url = with_segments(&self.api_base, ["files"])?;
        url.query_pairs_mut()
            .append_pair("q", &name_query(filename, &self.folder_id))
            .append_pair("fields", "files(id,name)")
            .append_pair("pageSize", "10")
            .append_pair("supportsAllDrives", "true")
            .append_pair("includeItemsFromAllDrives", "true")
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    fn media_url(&self, file_id: &str) -> Result<Url, TransferError> {
        let mut url = with_segments(&self.api_base, ["files", file_id])?;
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("supportsAllDrives", "true")
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    fn find_file_id(&self, filename: &str, deadline: Instant) -> Result<String, TransferError> {
        let body = self.client.get_bytes(&self.list_url(filename)?, deadline)?;
        let list: FileList = serde_json::from_slice(&body)
            .map_err(|e| TransferError::Protocol(format!("file listing: {e}")))?;
        pick_exact(list, filename).ok_or(TransferError::Missing)
    }
}

impl ContentStore for DriveFolderStore {
    fn folder(&self) -> &str {
        &self.folder_id
    }

    fn fetch(&self, filename: &str, dest: &Path, progress: TransferProgress<'_>) -> UpdateResult<u64> {
        let fail = |e: TransferError| e.into_update_error(filename, &self.folder_id);
        tracing::info!(filename, folder = %self.folder_id, "resolving in Drive folder");
        let deadline = self.client.deadline();
        let file_id = self.find_file_id(filename, deadline).map_err(fail)?;
        tracing::debug!(filename, file_id = %file_id, "resolved");
        let url = self.media_url(&file_id).map_err(fail)?;
        let bytes = self.client.get_to_file(&url, dest, deadline, progress).map_err(fail)?;
        tracing::info!(filename, bytes, dest = %dest.display(), "fetched");
        Ok(bytes)
    }
}

/// Folder id from a Drive folder URL (`.../folders/<id>?usp=...`) or the
/// input itself when it already is an id.
pub fn extract_folder_id(folder: &str) -> String {
    let folder = folder.trim();
    if let Some((_, rest)) = folder.split_once("/folders/") {
        let id: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if !id.is_empty() {
            return id;
        }
    }
    folder.to_string()
}

/// Drive search query for an exact name inside a folder. Quotes and
/// backslashes in either value are escaped per the Drive query grammar.
fn name_query(filename: &str, folder_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and trashed = false",
        escape_query(filename),
        escape_query(folder_id)
    )
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn pick_exact(list: FileList, filename: &str) -> Option<String> {
    list.files
        .into_iter()
        .find(|f| f.name == filename)
        .map(|f| f.id)
}
