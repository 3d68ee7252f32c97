use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// The circuit breaker's three states (§4.1, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

/// A readable snapshot of the breaker (§3). The live breaker
/// (`admission::circuit_breaker::CircuitBreaker`) keeps a sliding-window
/// deque of outcomes internally; this is the metrics-facing projection of
/// that state, matching the field set in §3 exactly.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct CircuitState {
    #[builder(default = CircuitStatus::Closed)]
    pub status: CircuitStatus,
    #[builder(default)]
    pub error_count: u32,
    #[builder(default)]
    pub success_count: u32,
    #[builder(default)]
    pub total_requests: u32,
    #[builder(default)]
    pub error_rate: f64,
    #[builder(default, setter(strip_option))]
    pub last_failure: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub next_retry: Option<DateTime<Utc>>,
    #[builder(default)]
    pub half_open_test_requests: u32,
}

impl CircuitState {
    pub fn is_request_allowed(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            CircuitStatus::Closed | CircuitStatus::HalfOpen => true,
            CircuitStatus::Open => self.next_retry.map_or(false, |retry| now >= retry),
        }
    }
}

/// Per-key (domain or project) admit-spacing record (§3).
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct ThrottleEntry {
    #[builder(setter(into))]
    pub key: String,
    #[builder(default, setter(strip_option))]
    pub last_request_time: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub next_allowed_time: Option<DateTime<Utc>>,
    #[builder(default)]
    pub request_count: u64,
    #[builder(default)]
    pub throttled: bool,
}

impl ThrottleEntry {
    pub fn is_allowed(&self, now: DateTime<Utc>) -> bool {
        self.next_allowed_time.map_or(true, |next| now >= next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_circuit_denies_until_next_retry() {
        let now = Utc::now();
        let state = CircuitState::builder()
            .status(CircuitStatus::Open)
            .next_retry(now + chrono::Duration::seconds(30))
            .build();
        assert!(!state.is_request_allowed(now));
        assert!(state.is_request_allowed(now + chrono::Duration::seconds(31)));
    }

    #[test]
    fn half_open_allows_probes() {
        let state = CircuitState::builder()
            .status(CircuitStatus::HalfOpen)
            .build();
        assert!(state.is_request_allowed(Utc::now()));
    }

    #[test]
    fn throttle_entry_blocks_before_next_allowed() {
        let now = Utc::now();
        let entry = ThrottleEntry::builder()
            .key("example.com")
            .next_allowed_time(now + chrono::Duration::seconds(5))
            .build();
        assert!(!entry.is_allowed(now));
        assert!(entry.is_allowed(now + chrono::Duration::seconds(6)));
    }
}
