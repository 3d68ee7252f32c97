//! The circuit breaker gate (§4.1): a sliding window of outcomes drives
//! CLOSED → OPEN → HALF_OPEN → CLOSED transitions. Kept as its own type so
//! `AdmissionController::check` can reason about it without touching the
//! throttle/usage/cost state.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::config::AdmissionConfig;
use crate::domain::{CircuitState, CircuitStatus};

struct Inner {
    status: CircuitStatus,
    events: VecDeque<(DateTime<Utc>, bool)>,
    last_failure: Option<DateTime<Utc>>,
    next_retry: Option<DateTime<Utc>>,
    half_open_test_requests: u32,
    half_open_successes: u32,
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    window: chrono::Duration,
    error_threshold: f64,
    recovery: chrono::Duration,
    half_open_max: u32,
}

/// What `check`'s circuit gate decided, so the caller can build the right
/// `RateLimitDecision` without re-deriving it (§4.1 step 1).
pub enum CircuitGate {
    Allow,
    DenyOpen { wait_time_ms: u64 },
    DenyHalfOpenSaturated { wait_time_ms: u64 },
}

impl CircuitBreaker {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: CircuitStatus::Closed,
                events: VecDeque::new(),
                last_failure: None,
                next_retry: None,
                half_open_test_requests: 0,
                half_open_successes: 0,
            }),
            window: chrono::Duration::from_std(config.circuit_breaker_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
            error_threshold: config.circuit_breaker_error_threshold,
            recovery: chrono::Duration::from_std(config.circuit_breaker_recovery)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
            half_open_max: config.circuit_breaker_half_open_requests,
        }
    }

    /// Evaluates the gate and performs any OPEN→HALF_OPEN transition that
    /// the arrival of this request triggers (§4.1 step 1).
    pub fn evaluate(&self, now: DateTime<Utc>) -> CircuitGate {
        let mut inner = self.inner.lock().unwrap();
        match inner.status {
            CircuitStatus::Open => {
                let next_retry = inner.next_retry.unwrap_or(now);
                if now < next_retry {
                    let wait = (next_retry - now).num_milliseconds().max(0) as u64;
                    return CircuitGate::DenyOpen { wait_time_ms: wait };
                }
                tracing::info!("circuit breaker: OPEN -> HALF_OPEN (recovery window elapsed)");
                inner.status = CircuitStatus::HalfOpen;
                inner.half_open_test_requests = 0;
                inner.half_open_successes = 0;
                CircuitGate::Allow
            }
            CircuitStatus::HalfOpen => {
                if inner.half_open_test_requests >= self.half_open_max {
                    return CircuitGate::DenyHalfOpenSaturated {
                        wait_time_ms: 60_000,
                    };
                }
                inner.half_open_test_requests += 1;
                CircuitGate::Allow
            }
            CircuitStatus::Closed => CircuitGate::Allow,
        }
    }

    /// Records an outcome and re-evaluates the CLOSED/HALF_OPEN transitions
    /// that depend on it (§4.1 "Circuit breaker state transitions").
    pub fn record(&self, now: DateTime<Utc>, success: bool) {
        let mut inner = self.inner.lock().unwrap();

        match inner.status {
            CircuitStatus::HalfOpen => {
                if success {
                    inner.half_open_successes += 1;
                    if inner.half_open_successes >= self.half_open_max {
                        tracing::info!(
                            "circuit breaker: HALF_OPEN -> CLOSED after {} consecutive successes",
                            inner.half_open_successes
                        );
                        inner.status = CircuitStatus::Closed;
                        inner.events.clear();
                        inner.half_open_successes = 0;
                        inner.half_open_test_requests = 0;
                        inner.next_retry = None;
                        return;
                    }
                } else {
                    tracing::warn!("circuit breaker: HALF_OPEN -> OPEN on probe failure");
                    inner.status = CircuitStatus::Open;
                    inner.last_failure = Some(now);
                    inner.next_retry = Some(now + self.recovery);
                    inner.half_open_successes = 0;
                    inner.half_open_test_requests = 0;
                    return;
                }
            }
            CircuitStatus::Open => {
                // A request admitted mid-transition; bookkeeping only.
            }
            CircuitStatus::Closed => {
                inner.events.push_back((now, success));
                if !success {
                    inner.last_failure = Some(now);
                }
                self.trim(&mut inner, now);

                let window_size = inner.events.len();
                if window_size == 0 {
                    return;
                }
                let failures = inner.events.iter().filter(|(_, ok)| !ok).count();
                let error_rate = failures as f64 / window_size as f64;
                if error_rate >= self.error_threshold {
                    tracing::warn!(
                        error_rate,
                        window_size,
                        "circuit breaker: CLOSED -> OPEN (error threshold exceeded)"
                    );
                    inner.status = CircuitStatus::Open;
                    inner.next_retry = Some(now + self.recovery);
                }
            }
        }
    }

    fn trim(&self, inner: &mut Inner, now: DateTime<Utc>) {
        while let Some((ts, _)) = inner.events.front() {
            if now - *ts > self.window {
                inner.events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Forces OPEN regardless of window state (§6.4 `triggerCircuitBreaker`).
    pub fn trigger(&self, now: DateTime<Utc>, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        tracing::warn!(reason, "circuit breaker: manually triggered OPEN");
        inner.status = CircuitStatus::Open;
        inner.last_failure = Some(now);
        inner.next_retry = Some(now + self.recovery);
        inner.half_open_test_requests = 0;
        inner.half_open_successes = 0;
    }

    /// Forces CLOSED with zeroed counters (§6.4 `resetCircuitBreaker`).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        tracing::info!("circuit breaker: manually reset to CLOSED");
        inner.status = CircuitStatus::Closed;
        inner.events.clear();
        inner.last_failure = None;
        inner.next_retry = None;
        inner.half_open_test_requests = 0;
        inner.half_open_successes = 0;
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> CircuitState {
        let inner = self.inner.lock().unwrap();
        let window_size = inner.events.len();
        let failures = inner.events.iter().filter(|(_, ok)| !ok).count();
        let successes = window_size - failures;
        let error_rate = if window_size == 0 {
            0.0
        } else {
            failures as f64 / window_size as f64
        };
        let _ = now;
        CircuitState::builder()
            .status(inner.status)
            .error_count(failures as u32)
            .success_count(successes as u32)
            .total_requests(window_size as u32)
            .error_rate(error_rate)
            .last_failure(inner.last_failure)
            .next_retry(inner.next_retry)
            .half_open_test_requests(inner.half_open_test_requests)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AdmissionConfig {
        AdmissionConfig {
            circuit_breaker_error_threshold: 0.5,
            circuit_breaker_window: std::time::Duration::from_secs(5),
            circuit_breaker_recovery: std::time::Duration::from_secs(2),
            circuit_breaker_half_open_requests: 5,
            ..AdmissionConfig::default()
        }
    }

    #[test]
    fn trips_open_on_majority_failures() {
        let breaker = CircuitBreaker::new(&config());
        let now = Utc::now();
        for _ in 0..10 {
            matches!(breaker.evaluate(now), CircuitGate::Allow);
            breaker.record(now, false);
        }
        let snapshot = breaker.snapshot(now);
        assert_eq!(snapshot.status, CircuitStatus::Open);
        assert!(snapshot.error_rate > 0.4);
    }

    #[test]
    fn half_open_closes_after_consecutive_successes() {
        let breaker = CircuitBreaker::new(&config());
        let now = Utc::now();
        breaker.trigger(now, "manual test trip");
        let later = now + chrono::Duration::seconds(3);
        for _ in 0..5 {
            assert!(matches!(breaker.evaluate(later), CircuitGate::Allow));
            breaker.record(later, true);
        }
        assert_eq!(breaker.snapshot(later).status, CircuitStatus::Closed);
    }

    #[test]
    fn manual_reset_is_idempotent() {
        let breaker = CircuitBreaker::new(&config());
        let now = Utc::now();
        breaker.trigger(now, "test");
        breaker.reset();
        breaker.reset();
        let snapshot = breaker.snapshot(now);
        assert_eq!(snapshot.status, CircuitStatus::Closed);
        assert_eq!(snapshot.error_count, 0);
    }

    #[test]
    fn manual_trigger_is_idempotent_with_single_window() {
        let breaker = CircuitBreaker::new(&config());
        let now = Utc::now();
        breaker.trigger(now, "first");
        let first_retry = breaker.snapshot(now).next_retry;
        breaker.trigger(now, "second");
        let second_retry = breaker.snapshot(now).next_retry;
        assert_eq!(first_retry, second_retry);
    }
}
