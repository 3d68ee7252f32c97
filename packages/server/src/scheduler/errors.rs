use thiserror::Error;

/// Terminal outcome of `scrape_with_retry` (§4.2: `ScrapingFailed(lastError, attempts)`).
#[derive(Debug, Error, Clone)]
pub enum SchedulerError {
    #[error("scraping failed after {attempts} attempt(s): {last_error}")]
    ScrapingFailed { last_error: String, attempts: u32 },
}
