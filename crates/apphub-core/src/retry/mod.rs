//! Retry and backoff for a single remote fetch.
//!
//! Transient transport faults (timeouts, throttling, connection drops, 5xx)
//! are retried with capped exponential backoff inside one download. Nothing
//! here retries across pipeline stages: a failed stage ends the pipeline and
//! the user re-runs the whole sequence.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::TransferError;
pub use policy::{FaultKind, RetryDecision, RetryPolicy};
pub use run::{deadline_after, run_with_retry};
