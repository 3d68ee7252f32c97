use std::time::Duration;

/// All recognized AdmissionController options (§4.1 table), with the
/// defaults named throughout §4.1/§6.5/§8.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub max_concurrent_per_project: usize,
    pub max_global_concurrent: usize,
    pub per_domain_throttle: Duration,
    pub per_project_throttle: Duration,
    pub daily_snapshot_limit: u64,
    pub hourly_snapshot_limit: u64,
    pub circuit_breaker_error_threshold: f64,
    pub circuit_breaker_window: Duration,
    pub circuit_breaker_recovery: Duration,
    pub circuit_breaker_half_open_requests: u32,
    pub max_daily_cost_usd: f64,
    pub max_hourly_cost_usd: f64,
    pub cost_per_snapshot_usd: f64,
    pub exponential_backoff_base: Duration,
    pub exponential_backoff_max: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_project: 3,
            max_global_concurrent: 10,
            per_domain_throttle: Duration::from_secs(5),
            per_project_throttle: Duration::from_secs(2),
            daily_snapshot_limit: 500,
            hourly_snapshot_limit: 60,
            circuit_breaker_error_threshold: 0.5,
            circuit_breaker_window: Duration::from_secs(60),
            circuit_breaker_recovery: Duration::from_secs(60),
            circuit_breaker_half_open_requests: 5,
            max_daily_cost_usd: 50.0,
            max_hourly_cost_usd: 10.0,
            cost_per_snapshot_usd: 0.05,
            exponential_backoff_base: Duration::from_millis(500),
            exponential_backoff_max: Duration::from_secs(30),
        }
    }
}

impl AdmissionConfig {
    /// Loads overrides from environment variables, falling back to
    /// `Default::default()` for anything unset, following the teacher's
    /// `Config::from_env` idiom (§10.3). Unrecognized env vars are never
    /// consulted, which is this config's equivalent of "unknown options
    /// rejected at load" for an env-sourced map (§9).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_per_project: env_usize(
                "ADMISSION_MAX_CONCURRENT_PER_PROJECT",
                defaults.max_concurrent_per_project,
            ),
            max_global_concurrent: env_usize(
                "ADMISSION_MAX_GLOBAL_CONCURRENT",
                defaults.max_global_concurrent,
            ),
            per_domain_throttle: env_millis(
                "ADMISSION_PER_DOMAIN_THROTTLE_MS",
                defaults.per_domain_throttle,
            ),
            per_project_throttle: env_millis(
                "ADMISSION_PER_PROJECT_THROTTLE_MS",
                defaults.per_project_throttle,
            ),
            daily_snapshot_limit: env_u64(
                "ADMISSION_DAILY_SNAPSHOT_LIMIT",
                defaults.daily_snapshot_limit,
            ),
            hourly_snapshot_limit: env_u64(
                "ADMISSION_HOURLY_SNAPSHOT_LIMIT",
                defaults.hourly_snapshot_limit,
            ),
            circuit_breaker_error_threshold: env_f64(
                "ADMISSION_CIRCUIT_BREAKER_ERROR_THRESHOLD",
                defaults.circuit_breaker_error_threshold,
            ),
            circuit_breaker_window: env_millis(
                "ADMISSION_CIRCUIT_BREAKER_WINDOW_MS",
                defaults.circuit_breaker_window,
            ),
            circuit_breaker_recovery: env_millis(
                "ADMISSION_CIRCUIT_BREAKER_RECOVERY_MS",
                defaults.circuit_breaker_recovery,
            ),
            circuit_breaker_half_open_requests: env_u32(
                "ADMISSION_CIRCUIT_BREAKER_HALF_OPEN_REQUESTS",
                defaults.circuit_breaker_half_open_requests,
            ),
            max_daily_cost_usd: env_f64("ADMISSION_MAX_DAILY_COST_USD", defaults.max_daily_cost_usd),
            max_hourly_cost_usd: env_f64(
                "ADMISSION_MAX_HOURLY_COST_USD",
                defaults.max_hourly_cost_usd,
            ),
            cost_per_snapshot_usd: env_f64(
                "ADMISSION_COST_PER_SNAPSHOT_USD",
                defaults.cost_per_snapshot_usd,
            ),
            exponential_backoff_base: env_millis(
                "ADMISSION_BACKOFF_BASE_MS",
                defaults.exponential_backoff_base,
            ),
            exponential_backoff_max: env_millis(
                "ADMISSION_BACKOFF_MAX_MS",
                defaults.exponential_backoff_max,
            ),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
