//! Background execution shell: runs a batch off the caller's task and hands
//! back a bounded event stream plus a single completion.
//!
//! The caller never blocks on pipeline work. Progress arrives through
//! `BatchHandle::next_event`; the summary through `finish` or `drain`, each
//! of which consumes the handle so the completion is observed exactly once.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{UpdateError, UpdateResult};
use crate::orchestrator::{BatchSummary, EventSink, ProgressEvent, Updater};
use crate::version_manager::UpdateCandidate;

pub use crate::orchestrator::BatchControl;

/// Events buffered between workers and the consumer.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

pub struct BatchHandle {
    events: mpsc::Receiver<ProgressEvent>,
    control: Arc<BatchControl>,
    completion: JoinHandle<UpdateResult<BatchSummary>>,
}

impl BatchHandle {
    /// Stop starting new pipelines. Running ones are left to finish.
    pub fn cancel(&self) {
        tracing::info!("batch cancellation requested");
        self.control.cancel();
    }

    pub fn control(&self) -> Arc<BatchControl> {
        Arc::clone(&self.control)
    }

    /// Next progress event; `None` once the batch has stopped emitting.
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// Wait for the summary, discarding remaining events. Workers are never
    /// held up by a consumer that stopped reading.
    pub async fn finish(self) -> Result<BatchSummary> {
        let BatchHandle {
            events, completion, ..
        } = self;
        drop(events);
        let summary = completion.await.context("batch task failed")??;
        Ok(summary)
    }

    /// Deliver every event to `on_event`, then return the summary.
    pub async fn drain(mut self, mut on_event: impl FnMut(ProgressEvent)) -> Result<BatchSummary> {
        while let Some(event) = self.events.recv().await {
            on_event(event);
        }
        self.finish().await
    }
}

/// Run `candidates` as one batch in the background.
pub fn spawn_batch(updater: Arc<Updater>, candidates: Vec<UpdateCandidate>, capacity: usize) -> BatchHandle {
    spawn_with(capacity, move |sink, control| async move {
        Ok(updater.run_batch(candidates, sink, control).await)
    })
}

/// Check, then update every candidate (or only those in `only`). A manifest
/// failure resolves the completion with that error and no pipeline runs.
/// Catalog applications that need no update are reported as up to date.
pub fn spawn_check_and_update(updater: Arc<Updater>, only: Vec<String>, capacity: usize) -> BatchHandle {
    spawn_with(capacity, move |sink, control| async move {
        let checker = Arc::clone(&updater);
        let mut report = tokio::task::spawn_blocking(move || checker.check())
            .await
            .map_err(|e| UpdateError::io("update check task", std::io::Error::other(e.to_string())))??;
        report.retain_ids(&only);
        let mut summary = updater.run_batch(report.candidates, sink, control).await;
        summary.up_to_date.extend(report.up_to_date);
        Ok::<_, UpdateError>(summary)
    })
}

fn spawn_with<F, Fut>(capacity: usize, body: F) -> BatchHandle
where
    F: FnOnce(EventSink, Arc<BatchControl>) -> Fut,
    Fut: std::future::Future<Output = UpdateResult<BatchSummary>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let control = Arc::new(BatchControl::new());
    let completion = tokio::spawn(body(EventSink::new(tx), Arc::clone(&control)));
    BatchHandle {
        events: rx,
        control,
        completion,
    }
}
