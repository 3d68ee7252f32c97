use std::time::Duration;

/// `CronEngine` tuning (§4.3): retention, health thresholds, and the default
/// health-check cadence.
#[derive(Debug, Clone)]
pub struct CronEngineConfig {
    /// How many `JobExecution`s to keep per job; oldest evicted on insert.
    pub execution_retention: usize,
    /// Consecutive failures before a job is flagged degraded (§4.3 "self-healing").
    pub max_consecutive_failures: u32,
    /// Consecutive failures before a job escalates past standard recovery.
    pub escalation_threshold: u32,
    /// How often `performHealthChecks` runs when driven by its own tick.
    pub health_check_interval: Duration,
}

impl Default for CronEngineConfig {
    fn default() -> Self {
        Self {
            execution_retention: 100,
            max_consecutive_failures: 3,
            escalation_threshold: 5,
            health_check_interval: Duration::from_secs(300),
        }
    }
}

impl CronEngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            execution_retention: std::env::var("CRON_EXECUTION_RETENTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.execution_retention),
            max_consecutive_failures: std::env::var("CRON_MAX_CONSECUTIVE_FAILURES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_consecutive_failures),
            escalation_threshold: std::env::var("CRON_ESCALATION_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.escalation_threshold),
            health_check_interval: std::env::var("CRON_HEALTH_CHECK_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.health_check_interval),
        }
    }
}
