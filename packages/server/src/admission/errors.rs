use thiserror::Error;

/// Why `AdmissionController::execute_with_rate_limit` refused or aborted a
/// call (§4.1, §9). Wraps the caller's own error type so the controller
/// never has to know what kind of work it is gating.
#[derive(Debug, Error)]
pub enum AdmissionError<E> {
    #[error("rate limited: {reason} (retry after {wait_time_ms}ms)")]
    RateLimited { reason: String, wait_time_ms: u64 },

    #[error("concurrency slot unavailable for this project")]
    ConcurrencyUnavailable,

    #[error(transparent)]
    Inner(#[from] E),
}
