//! A `ScrapeDriver` backed by the Firecrawl API (headless-browser rendering,
//! JS-heavy pages). Grounded in the teacher's `kernel/firecrawl_client.rs`,
//! trimmed to the single-page `/scrape` endpoint this trait needs — crawl
//! and multi-page discovery have no counterpart here.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::scrape_driver::{ScrapeDriver, ScrapeError, ScrapeOptions, WebsiteSnapshot};

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

pub struct FirecrawlScrapeDriver {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Serialize)]
struct ScrapeRequest {
    url: String,
    formats: Vec<String>,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    html: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
struct PageMetadata {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "statusCode")]
    status_code: Option<u16>,
}

impl FirecrawlScrapeDriver {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ScrapeError::DriverUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ScrapeDriver for FirecrawlScrapeDriver {
    async fn take_snapshot(
        &self,
        url: &str,
        options: &ScrapeOptions,
    ) -> Result<WebsiteSnapshot, ScrapeError> {
        let request = ScrapeRequest {
            url: url.to_string(),
            formats: vec!["markdown".to_string(), "html".to_string()],
        };

        let response = self
            .client
            .post(format!("{FIRECRAWL_API_URL}/scrape"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScrapeError::NetworkTimeout
                } else {
                    ScrapeError::NavigationFailed(e.to_string())
                }
            })?;

        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Err(ScrapeError::HttpError(status_code));
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::NavigationFailed(e.to_string()))?;

        if !body.success {
            return Err(ScrapeError::NavigationFailed("firecrawl reported failure".to_string()));
        }

        let data = body
            .data
            .ok_or_else(|| ScrapeError::NavigationFailed("no data returned".to_string()))?;
        let text = data.markdown.unwrap_or_default();
        let html = data.html.clone().unwrap_or_else(|| text.clone());
        let title = data
            .metadata
            .as_ref()
            .and_then(|m| m.title.clone())
            .unwrap_or_default();
        let description = data.metadata.as_ref().and_then(|m| m.description.clone());
        let effective_status = data.metadata.and_then(|m| m.status_code).unwrap_or(status_code);

        Ok(WebsiteSnapshot {
            url: url.to_string(),
            title,
            description,
            content_length: html.len(),
            html,
            text,
            timestamp: Utc::now(),
            status_code: effective_status,
            headers: HashMap::new(),
        })
    }
}
