//! `AdmissionController`: the single chokepoint every outbound scrape or
//! analysis call passes through (§4.1). `check` answers "would this be
//! admitted right now" without side effects; `execute_with_rate_limit` is
//! the side-effecting version real callers use.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::circuit_breaker::{CircuitBreaker, CircuitGate};
use super::concurrency::ConcurrencyTracker;
use super::config::AdmissionConfig;
use super::errors::AdmissionError;
use super::throttle::ThrottleMap;
use super::usage::UsageCounters;
use crate::domain::{CircuitState, ProjectId, TargetId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestSource {
    InitialReport,
    ScheduledReport,
    ManualRequest,
    Test,
}

/// Everything the controller needs to gate one call (§4.1).
#[derive(Debug, Clone)]
pub struct Context {
    pub project_id: ProjectId,
    pub competitor_id: Option<TargetId>,
    pub domain: String,
    pub priority: Priority,
    pub source: RequestSource,
    pub estimated_cost_usd: Option<f64>,
    pub request_id: Uuid,
}

impl Context {
    pub fn new(project_id: ProjectId, domain: impl Into<String>) -> Self {
        Self {
            project_id,
            competitor_id: None,
            domain: domain.into(),
            priority: Priority::Normal,
            source: RequestSource::ManualRequest,
            estimated_cost_usd: None,
            request_id: Uuid::new_v4(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QuotaRemaining {
    pub daily: u64,
    pub hourly: u64,
    pub concurrent: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct CostProjection {
    pub hourly_usd: f64,
    pub daily_usd: f64,
}

#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub wait_time_ms: Option<u64>,
    pub quota_remaining: QuotaRemaining,
    pub cost_projection: CostProjection,
    pub fallback: Option<String>,
}

impl RateLimitDecision {
    fn deny(reason: impl Into<String>, wait_time_ms: u64, quota: QuotaRemaining, cost: CostProjection) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            wait_time_ms: Some(wait_time_ms),
            quota_remaining: quota,
            cost_projection: cost,
            fallback: None,
        }
    }

    fn deny_with_fallback(
        reason: impl Into<String>,
        wait_time_ms: u64,
        quota: QuotaRemaining,
        cost: CostProjection,
        fallback: impl Into<String>,
    ) -> Self {
        let mut decision = Self::deny(reason, wait_time_ms, quota, cost);
        decision.fallback = Some(fallback.into());
        decision
    }

    fn allow(quota: QuotaRemaining, cost: CostProjection) -> Self {
        Self {
            allowed: true,
            reason: None,
            wait_time_ms: None,
            quota_remaining: quota,
            cost_projection: cost,
            fallback: None,
        }
    }
}

pub struct AdmissionController {
    config: AdmissionConfig,
    circuit: CircuitBreaker,
    domain_throttle: ThrottleMap,
    project_throttle: ThrottleMap,
    usage: UsageCounters,
    concurrency: ConcurrencyTracker,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        let circuit = CircuitBreaker::new(&config);
        let concurrency = ConcurrencyTracker::new(config.max_global_concurrent, config.max_concurrent_per_project);
        Self {
            config,
            circuit,
            domain_throttle: ThrottleMap::new(),
            project_throttle: ThrottleMap::new(),
            usage: UsageCounters::new(),
            concurrency,
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    pub fn circuit_snapshot(&self, now: DateTime<Utc>) -> CircuitState {
        self.circuit.snapshot(now)
    }

    /// §6.4 `triggerCircuitBreaker` management operation.
    pub fn trigger_circuit_breaker(&self, reason: &str) {
        self.circuit.trigger(Utc::now(), reason);
    }

    /// §6.4 `resetCircuitBreaker` management operation.
    pub fn reset_circuit_breaker(&self) {
        self.circuit.reset();
    }

    /// §4.5 REDUCE_LOAD remediation lowers effective global concurrency.
    pub fn set_global_concurrency_limit(&self, limit: usize) {
        self.concurrency.set_global_limit(limit);
    }

    pub fn global_concurrency_limit(&self) -> usize {
        self.concurrency.global_limit()
    }

    /// §4.5 CLEAR_CACHE remediation: drops all throttle entries.
    pub fn clear_throttles(&self) {
        self.domain_throttle.clear();
        self.project_throttle.clear();
    }

    /// Count of tracked domain/project throttle entries, for health metrics.
    pub fn throttle_counts(&self) -> (usize, usize) {
        (self.domain_throttle.len(), self.project_throttle.len())
    }

    fn project_throttle_key(project_id: ProjectId) -> String {
        project_id.to_string()
    }

    /// Evaluates the fixed six-gate order without mutating any state other
    /// than circuit OPEN->HALF_OPEN transitions that the gate's own arrival
    /// triggers (§4.1).
    pub fn check(&self, context: &Context, now: DateTime<Utc>) -> RateLimitDecision {
        let usage_snapshot = self.usage.snapshot(now);
        let cost = context.estimated_cost_usd.unwrap_or(self.config.cost_per_snapshot_usd);
        let (projected_hourly, projected_daily) = self.usage.project_cost(now, cost);
        let cost_projection = CostProjection {
            hourly_usd: projected_hourly,
            daily_usd: projected_daily,
        };
        let quota = QuotaRemaining {
            daily: self.config.daily_snapshot_limit.saturating_sub(usage_snapshot.daily_count),
            hourly: self.config.hourly_snapshot_limit.saturating_sub(usage_snapshot.hourly_count),
            concurrent: self
                .config
                .max_concurrent_per_project
                .saturating_sub(self.concurrency.project_in_flight(context.project_id)),
        };

        // Gate 1: circuit breaker.
        match self.circuit.evaluate(now) {
            CircuitGate::DenyOpen { wait_time_ms } => {
                return RateLimitDecision::deny_with_fallback(
                    "circuit breaker is OPEN",
                    wait_time_ms,
                    quota,
                    cost_projection,
                    "cached",
                );
            }
            CircuitGate::DenyHalfOpenSaturated { wait_time_ms } => {
                return RateLimitDecision::deny(
                    "circuit breaker HALF_OPEN probe budget exhausted",
                    wait_time_ms,
                    quota,
                    cost_projection,
                );
            }
            CircuitGate::Allow => {}
        }

        // Gate 2: cost ceilings. Daily is checked first so its "tomorrow"
        // fallback wins over the hourly message when both would trip.
        if projected_daily > self.config.max_daily_cost_usd {
            return RateLimitDecision::deny_with_fallback(
                "daily cost limit would be exceeded",
                UsageCounters::millis_until_next_hour(now),
                quota,
                cost_projection,
                "tomorrow",
            );
        }
        if projected_hourly > self.config.max_hourly_cost_usd {
            return RateLimitDecision::deny(
                "hourly cost limit would be exceeded",
                UsageCounters::millis_until_next_hour(now),
                quota,
                cost_projection,
            );
        }

        // Gate 3: usage counters.
        if usage_snapshot.daily_count >= self.config.daily_snapshot_limit {
            return RateLimitDecision::deny(
                "daily snapshot limit reached",
                UsageCounters::millis_until_next_hour(now),
                quota,
                cost_projection,
            );
        }
        if usage_snapshot.hourly_count >= self.config.hourly_snapshot_limit {
            return RateLimitDecision::deny(
                "hourly snapshot limit reached",
                UsageCounters::millis_until_next_hour(now),
                quota,
                cost_projection,
            );
        }

        // Gate 4: domain throttle.
        if let Some(wait) = self.domain_throttle.check(&context.domain, now) {
            return RateLimitDecision::deny(
                format!("domain {} throttled", context.domain),
                wait,
                quota,
                cost_projection,
            );
        }

        // Gate 5: project throttle.
        let project_key = Self::project_throttle_key(context.project_id);
        if let Some(wait) = self.project_throttle.check(&project_key, now) {
            return RateLimitDecision::deny("project throttled", wait, quota, cost_projection);
        }

        // Gate 6: concurrency.
        if self.concurrency.global_in_flight() >= self.concurrency.global_limit() {
            return RateLimitDecision::deny_with_fallback(
                "global concurrency limit reached",
                30_000,
                quota,
                cost_projection,
                "queue for later",
            );
        }
        if self.concurrency.project_in_flight(context.project_id) >= self.config.max_concurrent_per_project {
            return RateLimitDecision::deny_with_fallback(
                "project concurrency limit reached",
                30_000,
                quota,
                cost_projection,
                "queue for later",
            );
        }

        RateLimitDecision::allow(quota, cost_projection)
    }

    /// Gates, runs, and records the outcome of `f` (§4.1). Concurrency slots
    /// and throttle entries are only touched once admission is granted;
    /// release happens on every exit path via `ConcurrencySlot`'s `Drop`.
    pub async fn execute_with_rate_limit<T, E, F, Fut>(
        &self,
        context: Context,
        f: F,
    ) -> Result<T, AdmissionError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let now = Utc::now();
        let decision = self.check(&context, now);
        if !decision.allowed {
            return Err(AdmissionError::RateLimited {
                reason: decision.reason.unwrap_or_else(|| "denied".to_string()),
                wait_time_ms: decision.wait_time_ms.unwrap_or(0),
            });
        }

        let _slot = self
            .concurrency
            .try_acquire(context.project_id)
            .ok_or(AdmissionError::ConcurrencyUnavailable)?;

        self.domain_throttle.record(&context.domain, now, self.config.per_domain_throttle);
        self.project_throttle.record(
            &Self::project_throttle_key(context.project_id),
            now,
            self.config.per_project_throttle,
        );

        let outcome = f().await;
        match outcome {
            Ok(value) => {
                self.circuit.record(now, true);
                let cost = context.estimated_cost_usd.unwrap_or(self.config.cost_per_snapshot_usd);
                self.usage.record_admission(now, cost);
                Ok(value)
            }
            Err(error) => {
                self.circuit.record(now, false);
                Err(AdmissionError::Inner(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> AdmissionController {
        AdmissionController::new(AdmissionConfig::default())
    }

    #[tokio::test]
    async fn admits_and_records_success() {
        let controller = controller();
        let context = Context::new(ProjectId::new(), "example.com");
        let result: Result<u32, std::convert::Infallible> = controller
            .execute_with_rate_limit(context, || async { Ok(42) })
            .await
            .map_err(|_| unreachable!());
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn second_call_within_domain_spacing_is_denied() {
        let controller = controller();
        let project_id = ProjectId::new();
        let first = Context::new(project_id, "example.com");
        controller
            .execute_with_rate_limit(first, || async { Ok::<_, std::convert::Infallible>(()) })
            .await
            .unwrap();

        let second = Context::new(project_id, "example.com");
        let result = controller
            .execute_with_rate_limit(second, || async { Ok::<_, std::convert::Infallible>(()) })
            .await;
        assert!(matches!(result, Err(AdmissionError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn repeated_failures_trip_the_circuit() {
        let mut config = AdmissionConfig::default();
        config.circuit_breaker_error_threshold = 0.5;
        config.circuit_breaker_window = std::time::Duration::from_secs(60);
        config.per_domain_throttle = std::time::Duration::from_millis(0);
        config.per_project_throttle = std::time::Duration::from_millis(0);
        let controller = AdmissionController::new(config);

        for i in 0..10 {
            let context = Context::new(ProjectId::new(), format!("host{i}.example.com"));
            let _ = controller
                .execute_with_rate_limit(context, || async { Err::<(), _>("boom") })
                .await;
        }

        let context = Context::new(ProjectId::new(), "fresh.example.com");
        let decision = controller.check(&context, Utc::now());
        assert!(!decision.allowed);
    }
}
