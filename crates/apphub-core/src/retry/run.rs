use std::time::{Duration, Instant};

use super::classify::classify;
use super::error::TransferError;
use super::policy::{RetryDecision, RetryPolicy};

/// Runs a closure until it succeeds, the retry policy says to stop, or
/// `deadline` passes. The closure receives the time left before the
/// deadline and must bound its attempt by it. A backoff that would end past
/// the deadline is not slept; the last error is returned instead.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    deadline: Instant,
    mut f: F,
) -> Result<T, TransferError>
where
    F: FnMut(Duration) -> Result<T, TransferError>,
{
    let mut attempt = 1u32;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match f(remaining) {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        if d >= deadline.saturating_duration_since(Instant::now()) {
                            tracing::debug!(attempt, ?kind, "deadline reached, not retrying: {}", e);
                            return Err(e);
                        }
                        tracing::debug!(attempt, ?kind, delay_ms = d.as_millis() as u64, "retrying after: {}", e);
                        std::thread::sleep(d);
                        attempt += 1;
                    }
                }
            }
        }
    }
}

/// `now + limit`, saturating at a far deadline when the sum overflows.
pub fn deadline_after(limit: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(limit)
        .or_else(|| now.checked_add(Duration::from_secs(365 * 24 * 3600)))
        .unwrap_or(now)
}
