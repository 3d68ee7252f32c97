use std::time::Duration;

/// Scheduler tuning (§4.2).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub task_execution_delay: Duration,
    pub min_content_length: usize,
    pub default_max_retries: u32,
    pub scrape_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            task_execution_delay: Duration::from_millis(2_000),
            min_content_length: 100,
            default_max_retries: 3,
            scrape_timeout: Duration::from_secs(30),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            task_execution_delay: std::env::var("SCHEDULER_TASK_EXECUTION_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.task_execution_delay),
            min_content_length: std::env::var("SCHEDULER_MIN_CONTENT_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_content_length),
            default_max_retries: std::env::var("SCHEDULER_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_max_retries),
            scrape_timeout: std::env::var("SCHEDULER_SCRAPE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.scrape_timeout),
        }
    }
}
