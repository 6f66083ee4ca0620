//! Batch runner: independent pipelines with bounded parallelism.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;

use super::outcome::{BatchSummary, UpdateOutcome};
use super::state::{EventSink, PipelineState};
use super::Updater;
use crate::error::{ErrorKind, UpdateError, UpdateFailure};
use crate::version_manager::UpdateCandidate;

/// Cancellation flag shared between a running batch and its controller.
/// Cancelling stops new pipelines from starting; running ones finish.
#[derive(Debug, Default)]
pub struct BatchControl {
    cancelled: AtomicBool,
}

impl BatchControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Updater {
    /// Run every candidate to `Done` and summarize. One application's failure
    /// never stops another; candidates not started before cancellation end
    /// as `Failed(cancelled)`.
    pub async fn run_batch(
        self: Arc<Self>,
        candidates: Vec<UpdateCandidate>,
        events: EventSink,
        control: Arc<BatchControl>,
    ) -> BatchSummary {
        let max_concurrent = self.cfg.max_concurrent_updates.max(1);
        let ids: Vec<String> = candidates.iter().map(|c| c.app.id.clone()).collect();
        let mut outcomes: Vec<Option<UpdateOutcome>> = vec![None; candidates.len()];
        let mut pending = candidates.into_iter().enumerate();
        let mut join_set = JoinSet::new();
        tracing::info!(candidates = ids.len(), max_concurrent, "batch started");

        loop {
            while join_set.len() < max_concurrent && !control.is_cancelled() {
                let Some((index, candidate)) = pending.next() else {
                    break;
                };
                let updater = Arc::clone(&self);
                let events = events.clone();
                join_set.spawn_blocking(move || {
                    let run = panic::catch_unwind(AssertUnwindSafe(|| {
                        updater.run_pipeline(&candidate, &events)
                    }));
                    let outcome = run.unwrap_or_else(|_| {
                        let failure = UpdateFailure {
                            kind: ErrorKind::Install,
                            message: "update pipeline panicked".to_string(),
                        };
                        events.state(candidate.app_id(), PipelineState::Done { ok: false }, Some(failure.clone()));
                        UpdateOutcome::Failed(failure)
                    });
                    (index, outcome)
                });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => tracing::error!(error = %e, "pipeline task did not complete"),
            }
        }

        let cancelled = UpdateFailure::from(UpdateError::Cancelled);
        let mut summary = BatchSummary::default();
        for (index, app_id) in ids.into_iter().enumerate() {
            let outcome = match outcomes[index].take() {
                Some(outcome) => outcome,
                None => {
                    let failure = if control.is_cancelled() {
                        cancelled.clone()
                    } else {
                        UpdateFailure {
                            kind: ErrorKind::Io,
                            message: "pipeline task did not complete".to_string(),
                        }
                    };
                    events
                        .state_async(&app_id, PipelineState::Done { ok: false }, Some(failure.clone()))
                        .await;
                    UpdateOutcome::Failed(failure)
                }
            };
            summary.record(app_id, outcome);
        }

        let (updated, failed, up_to_date) = summary.counts();
        tracing::info!(updated, failed, up_to_date, cancelled = control.is_cancelled(), "batch finished");
        summary
    }
}
