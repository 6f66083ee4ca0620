//! Terminal results: one `UpdateOutcome` per application, one `BatchSummary` per batch.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, UpdateFailure};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum UpdateOutcome {
    UpToDate,
    /// Installed and recorded at this version.
    Updated(String),
    Failed(UpdateFailure),
}

impl UpdateOutcome {
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        UpdateOutcome::Failed(UpdateFailure {
            kind,
            message: message.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedApp {
    pub app_id: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedApp {
    pub app_id: String,
    pub failure: UpdateFailure,
}

/// Aggregate of a batch, in candidate order within each list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub updated: Vec<UpdatedApp>,
    pub failed: Vec<FailedApp>,
    pub up_to_date: Vec<String>,
}

impl BatchSummary {
    pub fn record(&mut self, app_id: impl Into<String>, outcome: UpdateOutcome) {
        let app_id = app_id.into();
        match outcome {
            UpdateOutcome::UpToDate => self.up_to_date.push(app_id),
            UpdateOutcome::Updated(version) => self.updated.push(UpdatedApp { app_id, version }),
            UpdateOutcome::Failed(failure) => self.failed.push(FailedApp { app_id, failure }),
        }
    }

    /// `(updated, failed, up_to_date)`.
    pub fn counts(&self) -> (usize, usize, usize) {
        (self.updated.len(), self.failed.len(), self.up_to_date.len())
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// True when some failure may clear up by re-running the update later.
    pub fn has_transient_failures(&self) -> bool {
        self.failed.iter().any(|f| f.failure.kind.is_transient())
    }

    pub fn outcome_of(&self, app_id: &str) -> Option<UpdateOutcome> {
        if let Some(u) = self.updated.iter().find(|u| u.app_id == app_id) {
            return Some(UpdateOutcome::Updated(u.version.clone()));
        }
        if let Some(f) = self.failed.iter().find(|f| f.app_id == app_id) {
            return Some(UpdateOutcome::Failed(f.failure.clone()));
        }
        self.up_to_date
            .iter()
            .any(|id| id == app_id)
            .then_some(UpdateOutcome::UpToDate)
    }
}

impl FromIterator<(String, UpdateOutcome)> for BatchSummary {
    fn from_iter<I: IntoIterator<Item = (String, UpdateOutcome)>>(iter: I) -> Self {
        let mut summary = BatchSummary::default();
        for (app_id, outcome) in iter {
            summary.record(app_id, outcome);
        }
        summary
    }
}
