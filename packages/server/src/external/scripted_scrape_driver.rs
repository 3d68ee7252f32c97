//! A scriptable `ScrapeDriver` test double (§10.4), following the teacher's
//! `MockIngestor`: canned responses keyed by URL, call recording, builder
//! construction so a scenario reads as a short chain of `.with_*` calls.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::scrape_driver::{ScrapeDriver, ScrapeError, ScrapeOptions, WebsiteSnapshot};

#[derive(Default)]
pub struct ScriptedScrapeDriver {
    snapshots: RwLock<HashMap<String, WebsiteSnapshot>>,
    failures: RwLock<HashMap<String, ScrapeError>>,
    calls: RwLock<Vec<String>>,
}

impl ScriptedScrapeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a successful snapshot for `url` (builder-style).
    pub fn with_snapshot(self, url: impl Into<String>, snapshot: WebsiteSnapshot) -> Self {
        self.snapshots.write().unwrap().insert(url.into(), snapshot);
        self
    }

    /// Scripts a failure for `url` (builder-style).
    pub fn with_failure(self, url: impl Into<String>, error: ScrapeError) -> Self {
        self.failures.write().unwrap().insert(url.into(), error);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl ScrapeDriver for ScriptedScrapeDriver {
    async fn take_snapshot(
        &self,
        url: &str,
        _options: &ScrapeOptions,
    ) -> Result<WebsiteSnapshot, ScrapeError> {
        self.calls.write().unwrap().push(url.to_string());

        if let Some(error) = self.failures.read().unwrap().get(url) {
            return Err(error.clone());
        }

        self.snapshots
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapeError::NavigationFailed(format!("no scripted response for {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_snapshot(url: &str) -> WebsiteSnapshot {
        WebsiteSnapshot {
            url: url.to_string(),
            title: "Example".to_string(),
            description: None,
            html: "<html><body>hello</body></html>".to_string(),
            text: "hello".to_string(),
            timestamp: Utc::now(),
            status_code: 200,
            headers: HashMap::new(),
            content_length: 32,
        }
    }

    #[tokio::test]
    async fn returns_scripted_snapshot_and_records_calls() {
        let driver = ScriptedScrapeDriver::new().with_snapshot("https://acme.test", sample_snapshot("https://acme.test"));

        let snapshot = driver
            .take_snapshot("https://acme.test", &ScrapeOptions::default())
            .await
            .unwrap();

        assert_eq!(snapshot.title, "Example");
        assert_eq!(driver.call_count(), 1);
        assert_eq!(driver.calls(), vec!["https://acme.test".to_string()]);
    }

    #[tokio::test]
    async fn returns_scripted_failure() {
        let driver = ScriptedScrapeDriver::new().with_failure("https://down.test", ScrapeError::NetworkTimeout);

        let result = driver.take_snapshot("https://down.test", &ScrapeOptions::default()).await;

        assert!(matches!(result, Err(ScrapeError::NetworkTimeout)));
    }

    #[tokio::test]
    async fn unscripted_url_fails_navigation() {
        let driver = ScriptedScrapeDriver::new();
        let result = driver.take_snapshot("https://unscripted.test", &ScrapeOptions::default()).await;
        assert!(matches!(result, Err(ScrapeError::NavigationFailed(_))));
    }
}
