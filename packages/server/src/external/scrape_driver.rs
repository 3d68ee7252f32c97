use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ScrapeOptions {
    #[builder(default = Duration::from_secs(30))]
    pub timeout: Duration,
    #[builder(default, setter(strip_option, into))]
    pub wait_for_selector: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub user_agent: Option<String>,
    #[builder(default = 3)]
    pub retries: u32,
    #[builder(default = Duration::from_millis(500))]
    pub retry_delay: Duration,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteSnapshot {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub html: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub content_length: usize,
}

#[derive(Debug, Error, Clone)]
pub enum ScrapeError {
    #[error("network timeout")]
    NetworkTimeout,
    #[error("http error {0}")]
    HttpError(u16),
    #[error("navigation failed: {0}")]
    NavigationFailed(String),
    #[error("driver unavailable: {0}")]
    DriverUnavailable(String),
}

/// The scraping transport collaborator (§6.2). Concrete adapters render a
/// page and return its content; they never retry — that policy lives in
/// `scheduler::scrape_with_retry`.
#[async_trait]
pub trait ScrapeDriver: Send + Sync {
    async fn take_snapshot(
        &self,
        url: &str,
        options: &ScrapeOptions,
    ) -> Result<WebsiteSnapshot, ScrapeError>;
}
