//! The admission-control layer (§4.1): every outbound scrape or analysis
//! call is gated through a single `AdmissionController` before it runs.

pub mod circuit_breaker;
pub mod concurrency;
pub mod config;
pub mod controller;
pub mod errors;
pub mod throttle;
pub mod usage;

pub use circuit_breaker::{CircuitBreaker, CircuitGate};
pub use concurrency::{ConcurrencySlot, ConcurrencyTracker};
pub use config::AdmissionConfig;
pub use controller::{
    AdmissionController, Context, CostProjection, Priority, QuotaRemaining, RateLimitDecision, RequestSource,
};
pub use errors::AdmissionError;
pub use throttle::ThrottleMap;
pub use usage::{UsageCounters, UsageSnapshot};
