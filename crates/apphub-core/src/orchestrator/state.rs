//! Pipeline states and the events a batch streams to its consumer.

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::UpdateFailure;

/// Per-application state. A pipeline only moves forward:
/// `Checking, Downloading, Verifying, Installing, Recording, Done`.
/// A queued candidate is idle and has emitted nothing yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Checking,
    Downloading,
    Verifying,
    Installing,
    Recording,
    Done { ok: bool },
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Checking => "checking",
            PipelineState::Downloading => "downloading",
            PipelineState::Verifying => "verifying",
            PipelineState::Installing => "installing",
            PipelineState::Recording => "recording",
            PipelineState::Done { ok: true } => "done",
            PipelineState::Done { ok: false } => "failed",
        }
    }

    pub fn is_done(self) -> bool {
        matches!(self, PipelineState::Done { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// State transition; `error` is set only on `Done { ok: false }`.
    State {
        app_id: String,
        state: PipelineState,
        error: Option<UpdateFailure>,
    },
    /// Bytes received for the package being downloaded.
    Transfer {
        app_id: String,
        bytes: u64,
        total: Option<u64>,
    },
}

impl ProgressEvent {
    pub fn app_id(&self) -> &str {
        match self {
            ProgressEvent::State { app_id, .. } | ProgressEvent::Transfer { app_id, .. } => app_id,
        }
    }
}

/// Sending half of the progress channel, or nothing.
///
/// State events wait for room in the channel so none is lost; transfer
/// events are dropped when the consumer lags. A closed channel is ignored.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn discard() -> Self {
        Self::default()
    }

    /// Blocking send; call from worker threads only.
    pub(crate) fn state(&self, app_id: &str, state: PipelineState, error: Option<UpdateFailure>) {
        if let Some(tx) = &self.tx {
            let _ = tx.blocking_send(ProgressEvent::State {
                app_id: app_id.to_string(),
                state,
                error,
            });
        }
    }

    pub(crate) async fn state_async(
        &self,
        app_id: &str,
        state: PipelineState,
        error: Option<UpdateFailure>,
    ) {
        if let Some(tx) = &self.tx {
            let _ = tx
                .send(ProgressEvent::State {
                    app_id: app_id.to_string(),
                    state,
                    error,
                })
                .await;
        }
    }

    pub(crate) fn transfer(&self, app_id: &str, bytes: u64, total: Option<u64>) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(ProgressEvent::Transfer {
                app_id: app_id.to_string(),
                bytes,
                total,
            });
        }
    }
}
