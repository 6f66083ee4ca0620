//! Blocking HTTP GET via libcurl, plus the plain HTTP folder store.

use std::cell::{Cell, RefCell};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use url::Url;

use super::part::PartFile;
use super::{ContentStore, Timeouts, TransferProgress};
use crate::error::UpdateResult;
use crate::retry::{deadline_after, run_with_retry, RetryPolicy, TransferError};

/// Largest body accepted by `get_bytes` (folder listings).
const MAX_LISTING_BYTES: usize = 4 * 1024 * 1024;

/// Shared GET helpers used by the HTTP-based stores.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    timeouts: Timeouts,
    retry: RetryPolicy,
}

impl HttpClient {
    pub(crate) fn new(timeouts: Timeouts, retry: RetryPolicy) -> Self {
        Self { timeouts, retry }
    }

    /// Deadline for one whole fetch, shared by every request and retry it makes.
    pub(crate) fn deadline(&self) -> Instant {
        deadline_after(self.timeouts.transfer)
    }

    /// GET `url` into `dest` through a `.part` file. Each attempt starts from
    /// an empty file; the destination is only replaced after a complete 2xx body.
    pub(crate) fn get_to_file(
        &self,
        url: &Url,
        dest: &Path,
        deadline: Instant,
        progress: TransferProgress<'_>,
    ) -> Result<u64, TransferError> {
        run_with_retry(&self.retry, deadline, |left| {
            let mut part = PartFile::create(dest).map_err(TransferError::Storage)?;
            perform(url, self.timeouts.connect, left, &mut |data| part.write(data), &mut *progress)?;
            part.commit(dest).map_err(TransferError::Storage)
        })
    }

    /// GET `url` into memory (small bodies only).
    pub(crate) fn get_bytes(&self, url: &Url, deadline: Instant) -> Result<Vec<u8>, TransferError> {
        run_with_retry(&self.retry, deadline, |left| {
            let mut body = Vec::new();
            perform(
                url,
                self.timeouts.connect,
                left,
                &mut |data| {
                    if body.len() + data.len() > MAX_LISTING_BYTES {
                        return Err(io::Error::other("response body too large"));
                    }
                    body.extend_from_slice(data);
                    Ok(())
                },
                &mut |_, _| {},
            )?;
            Ok(body)
        })
    }
}

/// One GET bounded by `limit`. Body bytes of a 2xx response go to `sink`;
/// error bodies are discarded.
fn perform(
    url: &Url,
    connect: Duration,
    limit: Duration,
    sink: &mut dyn FnMut(&[u8]) -> io::Result<()>,
    progress: TransferProgress<'_>,
) -> Result<(), TransferError> {
    let status = Cell::new(0u32);
    let content_length = Cell::new(None::<u64>);
    let received = Cell::new(0u64);
    let storage_error: RefCell<Option<io::Error>> = RefCell::new(None);

    let mut easy = curl::easy::Easy::new();
    easy.url(url.as_str()).map_err(TransferError::Curl)?;
    easy.follow_location(true).map_err(TransferError::Curl)?;
    easy.max_redirections(10).map_err(TransferError::Curl)?;
    // A zero timeout means "none" to curl.
    let limit = limit.max(Duration::from_millis(1));
    easy.connect_timeout(connect.min(limit)).map_err(TransferError::Curl)?;
    easy.timeout(limit).map_err(TransferError::Curl)?;
    easy.useragent(concat!("apphub/", env!("CARGO_PKG_VERSION")))
        .map_err(TransferError::Curl)?;

    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|line| {
                if let Ok(line) = std::str::from_utf8(line) {
                    if let Some(code) = parse_status_line(line) {
                        // New response (e.g. after a redirect): reset per-response state.
                        status.set(code);
                        content_length.set(None);
                    } else if let Some(len) = parse_content_length(line) {
                        content_length.set(Some(len));
                    }
                }
                true
            })
            .map_err(TransferError::Curl)?;
        transfer
            .write_function(|data| {
                if !(200..300).contains(&status.get()) {
                    return Ok(data.len());
                }
                if let Err(e) = sink(data) {
                    *storage_error.borrow_mut() = Some(e);
                    return Ok(0); // abort transfer
                }
                let total = received.get() + data.len() as u64;
                received.set(total);
                progress(total, content_length.get());
                Ok(data.len())
            })
            .map_err(TransferError::Curl)?;
        transfer.perform()
    };

    if let Some(e) = storage_error.take() {
        return Err(TransferError::Storage(e));
    }
    performed.map_err(TransferError::Curl)?;

    let code = easy.response_code().map_err(TransferError::Curl)?;
    if !(200..300).contains(&code) {
        return Err(TransferError::Http(code));
    }
    if let Some(expected) = content_length.get() {
        if received.get() != expected {
            return Err(TransferError::Protocol(format!(
                "short body: {} of {} bytes",
                received.get(),
                expected
            )));
        }
    }
    Ok(())
}

fn parse_status_line(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("HTTP/")?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

fn parse_content_length(line: &str) -> Option<u64> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}

/// Append `segments` to the path of `base`, percent-encoding each one.
pub(crate) fn with_segments<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, TransferError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| TransferError::Protocol(format!("{base} cannot be a base URL")))?;
        path.pop_if_empty();
        for s in segments {
            path.push(s);
        }
    }
    Ok(url)
}

/// Folder served over plain HTTP(S): `<base_url>/<folder>/<filename>`.
/// A 404 for the file means the name does not exist in the folder.
#[derive(Debug, Clone)]
pub struct HttpFolderStore {
    base: Url,
    folder: String,
    client: HttpClient,
}

impl HttpFolderStore {
    pub fn new(base_url: &str, folder: &str, timeouts: Timeouts, retry: RetryPolicy) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid base URL {base_url}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("{base_url} cannot be used as a base URL");
        }
        Ok(Self {
            base,
            folder: folder.trim_matches('/').to_string(),
            client: HttpClient::new(timeouts, retry),
        })
    }

    pub fn file_url(&self, filename: &str) -> Result<Url, TransferError> {
        let segments = self
            .folder
            .split('/')
            .filter(|s| !s.is_empty())
            .chain(std::iter::once(filename));
        with_segments(&self.base, segments)
    }
}

impl ContentStore for HttpFolderStore {
    fn folder(&self) -> &str {
        &self.folder
    }

    fn fetch(&self, filename: &str, dest: &Path, progress: TransferProgress<'_>) -> UpdateResult<u64> {
        let fail = |e: TransferError| e.into_update_error(filename, &self.folder);
        let url = self.file_url(filename).map_err(fail)?;
        tracing::info!(filename, url = %url, "fetching");
        let deadline = self.client.deadline();
        let bytes = self.client.get_to_file(&url, dest, deadline, progress).map_err(fail)?;
        tracing::info!(filename, bytes, dest = %dest.display(), "fetched");
        Ok(bytes)
    }
}
