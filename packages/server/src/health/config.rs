use std::time::Duration;

/// All recognized HealthSupervisor options (§4.5/§6.5), with the defaults
/// named throughout those sections.
#[derive(Debug, Clone)]
pub struct HealthSupervisorConfig {
    pub check_interval: Duration,
    pub cooldown_period: Duration,
    pub execution_retention: usize,
    pub snapshot_retention_per_target: usize,
    pub reduce_load_factor: f64,
    pub clear_cache_enabled: bool,
    pub reduce_load_enabled: bool,
    pub resource_cleanup_enabled: bool,
    pub restart_service_enabled: bool,
}

impl Default for HealthSupervisorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(300_000),
            cooldown_period: Duration::from_millis(60_000),
            execution_retention: 100,
            snapshot_retention_per_target: 20,
            reduce_load_factor: 0.8,
            clear_cache_enabled: true,
            reduce_load_enabled: true,
            resource_cleanup_enabled: true,
            restart_service_enabled: false,
        }
    }
}

impl HealthSupervisorConfig {
    /// Loads overrides from environment variables, falling back to
    /// `Default::default()` for anything unset (§10.3).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            check_interval: env_millis("HEALTH_CHECK_INTERVAL_MS", defaults.check_interval),
            cooldown_period: env_millis("HEALTH_COOLDOWN_PERIOD_MS", defaults.cooldown_period),
            execution_retention: env_usize("HEALTH_EXECUTION_RETENTION", defaults.execution_retention),
            snapshot_retention_per_target: env_usize(
                "HEALTH_SNAPSHOT_RETENTION_PER_TARGET",
                defaults.snapshot_retention_per_target,
            ),
            reduce_load_factor: env_f64("HEALTH_REDUCE_LOAD_FACTOR", defaults.reduce_load_factor),
            clear_cache_enabled: env_bool("HEALTH_CLEAR_CACHE_ENABLED", defaults.clear_cache_enabled),
            reduce_load_enabled: env_bool("HEALTH_REDUCE_LOAD_ENABLED", defaults.reduce_load_enabled),
            resource_cleanup_enabled: env_bool(
                "HEALTH_RESOURCE_CLEANUP_ENABLED",
                defaults.resource_cleanup_enabled,
            ),
            restart_service_enabled: env_bool(
                "HEALTH_RESTART_SERVICE_ENABLED",
                defaults.restart_service_enabled,
            ),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
