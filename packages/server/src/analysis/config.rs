use std::time::Duration;

/// All recognized AnalysisOrchestrator options (§6.5), with the defaults
/// named throughout §4.4/§6.5.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub target_time_to_analysis: Duration,
    pub min_analysis_content_length: usize,
    pub analysis_max_retries: u32,
    pub snapshots_per_target: usize,
    pub fresh_reanalysis_after: Duration,
    pub stale_reanalysis_after: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_time_to_analysis: Duration::from_millis(7_200_000),
            min_analysis_content_length: 100,
            analysis_max_retries: 3,
            snapshots_per_target: 5,
            fresh_reanalysis_after: Duration::from_secs(4 * 3600),
            stale_reanalysis_after: Duration::from_secs(24 * 3600),
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(10),
        }
    }
}

impl AnalysisConfig {
    /// Loads overrides from environment variables, falling back to
    /// `Default::default()` for anything unset (§10.3).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            target_time_to_analysis: env_millis("ANALYSIS_TARGET_TIME_TO_ANALYSIS_MS", defaults.target_time_to_analysis),
            min_analysis_content_length: env_usize(
                "ANALYSIS_MIN_CONTENT_LENGTH",
                defaults.min_analysis_content_length,
            ),
            analysis_max_retries: env_u32("ANALYSIS_MAX_RETRIES", defaults.analysis_max_retries),
            snapshots_per_target: env_usize("ANALYSIS_SNAPSHOTS_PER_TARGET", defaults.snapshots_per_target),
            fresh_reanalysis_after: env_millis(
                "ANALYSIS_FRESH_REANALYSIS_AFTER_MS",
                defaults.fresh_reanalysis_after,
            ),
            stale_reanalysis_after: env_millis(
                "ANALYSIS_STALE_REANALYSIS_AFTER_MS",
                defaults.stale_reanalysis_after,
            ),
            backoff_base: env_millis("ANALYSIS_BACKOFF_BASE_MS", defaults.backoff_base),
            backoff_max: env_millis("ANALYSIS_BACKOFF_MAX_MS", defaults.backoff_max),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
