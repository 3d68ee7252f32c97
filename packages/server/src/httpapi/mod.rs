//! Management HTTP surface (§6.4): health, freshness, manual triggers, cron
//! job administration, circuit breaker overrides, and metrics. Grounded in
//! the teacher's `Extension<State>` handler shape and its `routes/health.rs`
//! health-check endpoint.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
