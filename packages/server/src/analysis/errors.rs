use thiserror::Error;

use crate::external::object_store::ObjectStoreError;

/// §7 `BackendError`/`QualityValidationError` plus the orchestrator's own
/// precondition failure. Retried failures never reach this enum; only the
/// terminal outcome of an exhausted retry budget does.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("project has no products or competitors to analyse")]
    NoTargets,
    #[error("analysis backend failed after {attempts} attempt(s): {message}")]
    BackendExhausted { attempts: u32, message: String },
    #[error("analysis output too short: {length} chars, need at least {minimum}")]
    QualityTooLow { length: usize, minimum: usize },
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
}
