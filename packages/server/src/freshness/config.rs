/// Thresholds driving freshness classification (§3, §4.2).
#[derive(Debug, Clone, Copy)]
pub struct FreshnessConfig {
    pub freshness_threshold_days: i64,
    pub high_priority_age_days: i64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            freshness_threshold_days: 7,
            high_priority_age_days: 14,
        }
    }
}

impl FreshnessConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            freshness_threshold_days: std::env::var("FRESHNESS_THRESHOLD_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.freshness_threshold_days),
            high_priority_age_days: std::env::var("FRESHNESS_HIGH_PRIORITY_AGE_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.high_priority_age_days),
        }
    }
}
