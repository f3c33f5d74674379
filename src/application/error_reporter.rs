// Error-reporting collaborator
use crate::domain::error::ReconcileError;

pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &ReconcileError);
}

/// Writes reported errors to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, error: &ReconcileError) {
        match error {
            ReconcileError::StaleResult { .. } => tracing::debug!("{}", error),
            ReconcileError::InvalidConfiguration(_) => tracing::error!("{}", error),
            _ => tracing::warn!("{}", error),
        }
    }
}
