use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::admission::AdmissionConfig;
use crate::analysis::AnalysisConfig;
use crate::cron::CronEngineConfig;
use crate::freshness::FreshnessConfig;
use crate::health::HealthSupervisorConfig;
use crate::scheduler::SchedulerConfig;

/// Top-level application configuration (§6.5): connection/listen settings
/// plus one nested config per component, each loaded through its own
/// `from_env()` so a component's defaults stay defined next to the
/// component itself.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub anthropic_api_key: String,
    pub firecrawl_api_key: Option<String>,
    pub admission: AdmissionConfig,
    pub cron: CronEngineConfig,
    pub scheduler: SchedulerConfig,
    pub freshness: FreshnessConfig,
    pub health: HealthSupervisorConfig,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// `.env` in development (§6.5).
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY must be set")?,
            firecrawl_api_key: env::var("FIRECRAWL_API_KEY").ok(),
            admission: AdmissionConfig::from_env(),
            cron: CronEngineConfig::from_env(),
            scheduler: SchedulerConfig::from_env(),
            freshness: FreshnessConfig::from_env(),
            health: HealthSupervisorConfig::from_env(),
            analysis: AnalysisConfig::from_env(),
        })
    }
}
