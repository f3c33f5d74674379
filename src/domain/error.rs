// Reconciliation error taxonomy
use crate::domain::sample::MachineId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReconcileError {
    /// Programmer or configuration error; the only variant raised as a hard failure.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("history fetch failed for machine {machine}: {reason}")]
    FetchFailure { machine: MachineId, reason: String },

    #[error("feed {feed} closed ({reason}), retrying: {retrying}")]
    TransportClosed {
        feed: String,
        reason: String,
        retrying: bool,
    },

    /// A superseded result. Never reported as a failure.
    #[error("stale result for machine {machine} (generation {generation})")]
    StaleResult { machine: MachineId, generation: u64 },

    #[error("malformed message on {feed}: {reason}")]
    MalformedMessage { feed: String, reason: String },
}

impl ReconcileError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub fn malformed(feed: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedMessage {
            feed: feed.into(),
            reason: reason.to_string(),
        }
    }
}
