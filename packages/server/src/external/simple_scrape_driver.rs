//! A non-headless `ScrapeDriver` using reqwest + scraper + htmd: no
//! JavaScript rendering, but no per-page API cost either. Grounded in the
//! teacher's `kernel/simple_scraper.rs`, trimmed to the single-page fetch
//! this trait asks for (no crawl/link-discovery — that lived outside the
//! core being rebuilt here).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use scraper::{Html, Selector};

use super::scrape_driver::{ScrapeDriver, ScrapeError, ScrapeOptions, WebsiteSnapshot};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct SimpleScrapeDriver {
    client: reqwest::Client,
}

impl SimpleScrapeDriver {
    pub fn new() -> Result<Self, ScrapeError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                .parse()
                .map_err(|_| ScrapeError::DriverUnavailable("invalid default headers".to_string()))?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(DEFAULT_USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ScrapeError::DriverUnavailable(e.to_string()))?;

        Ok(Self { client })
    }

    fn extract_title(document: &Html) -> String {
        let selector = match Selector::parse("title") {
            Ok(s) => s,
            Err(_) => return String::new(),
        };
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    fn extract_description(document: &Html) -> Option<String> {
        let selector = Selector::parse(r#"meta[name="description"]"#).ok()?;
        document
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(str::to_string)
    }

    fn html_to_text(html: &str) -> String {
        htmd::convert(html).unwrap_or_else(|_| {
            let document = Html::parse_document(html);
            document.root_element().text().collect::<String>()
        })
    }
}

#[async_trait]
impl ScrapeDriver for SimpleScrapeDriver {
    async fn take_snapshot(
        &self,
        url: &str,
        options: &ScrapeOptions,
    ) -> Result<WebsiteSnapshot, ScrapeError> {
        let response = tokio::time::timeout(options.timeout, self.client.get(url).send())
            .await
            .map_err(|_| ScrapeError::NetworkTimeout)?
            .map_err(|e| ScrapeError::NavigationFailed(e.to_string()))?;

        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Err(ScrapeError::HttpError(status_code));
        }

        let mut headers = std::collections::HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.to_string(), value.to_string());
            }
        }

        let html = response
            .text()
            .await
            .map_err(|e| ScrapeError::NavigationFailed(e.to_string()))?;
        let document = Html::parse_document(&html);
        let title = Self::extract_title(&document);
        let description = Self::extract_description(&document);
        let text = Self::html_to_text(&html);
        let content_length = html.len();

        Ok(WebsiteSnapshot {
            url: url.to_string(),
            title,
            description,
            html,
            text,
            timestamp: Utc::now(),
            status_code,
            headers,
            content_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_from_document() {
        let document = Html::parse_document("<html><head><title>Example</title></head></html>");
        assert_eq!(SimpleScrapeDriver::extract_title(&document), "Example");
    }

    #[test]
    fn html_to_text_strips_tags() {
        let text = SimpleScrapeDriver::html_to_text("<h1>Hello</h1><p>World</p>");
        assert!(text.contains("Hello"));
        assert!(text.contains("World"));
    }
}
