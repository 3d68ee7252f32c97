//! Scheduler (§4.2): drains `FreshnessEvaluator` work items through
//! `AdmissionController`, retrying and backing off per item, persisting
//! accepted content as a `Snapshot`.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::SchedulerConfig;
use super::errors::SchedulerError;
use crate::admission::{AdmissionController, AdmissionError, Context as AdmissionContext, Priority, RequestSource};
use crate::domain::{ProjectId, Snapshot, SnapshotMetadata, TargetId, TargetKind, WorkItem, WorkItemPriority, WorkItemReason};
use crate::external::object_store::{ObjectStore, ObjectStoreError};
use crate::external::scrape_driver::{ScrapeDriver, ScrapeOptions, WebsiteSnapshot};
use crate::freshness::FreshnessEvaluator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_type: TargetKind,
    pub target_id: TargetId,
    pub success: bool,
    pub snapshot_id: Option<crate::domain::SnapshotId>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub correlation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckAndTriggerResult {
    pub triggered: bool,
    pub tasks_executed: usize,
    pub results: Vec<TaskOutcome>,
}

pub struct Scheduler {
    store: Arc<dyn ObjectStore>,
    driver: Arc<dyn ScrapeDriver>,
    admission: Arc<AdmissionController>,
    evaluator: Arc<FreshnessEvaluator>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        driver: Arc<dyn ScrapeDriver>,
        admission: Arc<AdmissionController>,
        evaluator: Arc<FreshnessEvaluator>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            driver,
            admission,
            evaluator,
            config,
        }
    }

    /// §4.2 `scrapeWithRetry`: validates content, retries on transport error
    /// or insufficient content, fails terminally with `ScrapingFailed`.
    pub async fn scrape_with_retry(
        &self,
        url: &str,
        max_retries: u32,
        _correlation_id: Uuid,
    ) -> Result<WebsiteSnapshot, SchedulerError> {
        let options = ScrapeOptions::builder().timeout(self.config.scrape_timeout).build();
        let mut last_error = String::new();
        let max_retries = max_retries.max(1);

        for attempt in 1..=max_retries {
            match self.driver.take_snapshot(url, &options).await {
                Ok(snapshot) => {
                    if self.is_valid_content(&snapshot) {
                        return Ok(snapshot);
                    }
                    last_error = "insufficient_content".to_string();
                }
                Err(error) => {
                    last_error = error.to_string();
                }
            }

            if attempt == max_retries {
                return Err(SchedulerError::ScrapingFailed {
                    last_error,
                    attempts: attempt,
                });
            }

            let backoff_ms = 2u64.saturating_pow(attempt) * 500 + rand::thread_rng().gen_range(0..1000);
            tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
        }

        Err(SchedulerError::ScrapingFailed {
            last_error,
            attempts: max_retries,
        })
    }

    fn is_valid_content(&self, snapshot: &WebsiteSnapshot) -> bool {
        snapshot.html.len() >= self.config.min_content_length && (!snapshot.title.is_empty() || !snapshot.text.is_empty())
    }

    fn admission_context(&self, project_id: ProjectId, item: &WorkItem) -> AdmissionContext {
        let domain = url::Url::parse(&item.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| item.url.clone());
        let priority = if item.priority == WorkItemPriority::High {
            Priority::High
        } else {
            Priority::Normal
        };
        let source = if item.reason == WorkItemReason::ManualTrigger {
            RequestSource::ManualRequest
        } else {
            RequestSource::ScheduledReport
        };
        let mut context = AdmissionContext::new(project_id, domain);
        context.priority = priority;
        context.source = source;
        context.request_id = item.correlation_id;
        if item.target_kind == TargetKind::Competitor {
            context.competitor_id = Some(item.target_id);
        }
        context
    }

    /// §4.2 `checkAndTrigger`: orders work items by priority then insertion
    /// order, dispatches each through admission control, and persists
    /// accepted scrapes. Individual failures never abort the batch.
    pub async fn check_and_trigger(&self, project_id: ProjectId) -> Result<CheckAndTriggerResult, ObjectStoreError> {
        let mut items = self.evaluator.work_items(project_id).await?;
        items.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut results = Vec::with_capacity(items.len());
        let total = items.len();

        for (index, item) in items.into_iter().enumerate() {
            let started = Utc::now();
            let context = self.admission_context(project_id, &item);
            let correlation_id = item.correlation_id;
            let target_id = item.target_id;
            let task_type = item.target_kind;
            let url = item.url.clone();
            let max_retries = self.config.default_max_retries;

            let outcome = self
                .admission
                .execute_with_rate_limit(context, || self.scrape_with_retry(&url, max_retries, correlation_id))
                .await;

            let duration_ms = (Utc::now() - started).num_milliseconds().max(0) as u64;

            let task_outcome = match outcome {
                Ok(website_snapshot) => {
                    let snapshot = Snapshot::builder()
                        .target_id(target_id)
                        .captured_at(website_snapshot.timestamp)
                        .html(website_snapshot.html)
                        .text(website_snapshot.text)
                        .title(website_snapshot.title)
                        .metadata(
                            SnapshotMetadata::builder()
                                .status_code(website_snapshot.status_code)
                                .headers(website_snapshot.headers)
                                .scrape_duration_ms(duration_ms)
                                .content_length(website_snapshot.content_length)
                                .method("scheduler")
                                .build(),
                        )
                        .build();
                    let persisted = self.store.create_snapshot(snapshot).await?;
                    TaskOutcome {
                        task_type,
                        target_id,
                        success: true,
                        snapshot_id: Some(persisted.id),
                        error: None,
                        duration_ms,
                        correlation_id,
                    }
                }
                Err(AdmissionError::RateLimited { reason, .. }) => {
                    let error = if reason.to_lowercase().contains("circuit breaker") {
                        "Circuit breaker is open".to_string()
                    } else {
                        reason
                    };
                    TaskOutcome {
                        task_type,
                        target_id,
                        success: false,
                        snapshot_id: None,
                        error: Some(error),
                        duration_ms,
                        correlation_id,
                    }
                }
                Err(AdmissionError::ConcurrencyUnavailable) => TaskOutcome {
                    task_type,
                    target_id,
                    success: false,
                    snapshot_id: None,
                    error: Some("concurrency slot unavailable".to_string()),
                    duration_ms,
                    correlation_id,
                },
                Err(AdmissionError::Inner(scheduler_error)) => TaskOutcome {
                    task_type,
                    target_id,
                    success: false,
                    snapshot_id: None,
                    error: Some(scheduler_error.to_string()),
                    duration_ms,
                    correlation_id,
                },
            };
            results.push(task_outcome);

            if index + 1 < total {
                tokio::time::sleep(self.config.task_execution_delay).await;
            }
        }

        Ok(CheckAndTriggerResult {
            triggered: !results.is_empty(),
            tasks_executed: results.len(),
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmissionConfig;
    use crate::domain::{Project, Target, TargetKind};
    use crate::external::in_memory_store::InMemoryObjectStore;
    use crate::external::scrape_driver::ScrapeError;
    use crate::external::scripted_scrape_driver::ScriptedScrapeDriver;
    use crate::freshness::FreshnessConfig;

    fn scheduler_config() -> SchedulerConfig {
        SchedulerConfig {
            task_execution_delay: std::time::Duration::from_millis(0),
            min_content_length: 10,
            default_max_retries: 2,
            scrape_timeout: std::time::Duration::from_secs(5),
        }
    }

    fn sample_snapshot(url: &str) -> WebsiteSnapshot {
        WebsiteSnapshot {
            url: url.to_string(),
            title: "Acme".to_string(),
            description: None,
            html: "<html><body>a lot of content here</body></html>".to_string(),
            text: "a lot of content here".to_string(),
            timestamp: Utc::now(),
            status_code: 200,
            headers: std::collections::HashMap::new(),
            content_length: 200,
        }
    }

    fn seeded_project(store: &InMemoryObjectStore) -> ProjectId {
        let project = Project::builder().name("acme").build();
        store.seed_project(project.clone());
        project.id
    }

    fn seeded_target(store: &InMemoryObjectStore, project_id: ProjectId, url: &str) -> TargetId {
        let target = Target::builder()
            .project_id(project_id)
            .kind(TargetKind::Product)
            .display_name("product")
            .url(url)
            .build();
        store.seed_target(target.clone());
        target.id
    }

    #[tokio::test]
    async fn cold_project_produces_high_priority_snapshot() {
        let store = Arc::new(InMemoryObjectStore::new());
        let project_id = seeded_project(&store);
        seeded_target(&store, project_id, "https://acme.test/product");

        let driver = Arc::new(ScriptedScrapeDriver::new().with_snapshot(
            "https://acme.test/product",
            sample_snapshot("https://acme.test/product"),
        ));
        let admission = Arc::new(AdmissionController::new(AdmissionConfig::default()));
        let evaluator = Arc::new(FreshnessEvaluator::new(store.clone(), FreshnessConfig::default()));
        let scheduler = Scheduler::new(store.clone(), driver.clone(), admission, evaluator, scheduler_config());

        let result = scheduler.check_and_trigger(project_id).await.unwrap();

        assert!(result.triggered);
        assert_eq!(result.tasks_executed, 1);
        assert!(result.results[0].success);
        assert!(result.results[0].snapshot_id.is_some());
        assert_eq!(driver.call_count(), 1);
    }

    #[tokio::test]
    async fn fresh_project_triggers_nothing() {
        let store = Arc::new(InMemoryObjectStore::new());
        let project_id = seeded_project(&store);
        let target_id = seeded_target(&store, project_id, "https://acme.test/fresh");
        store
            .create_snapshot(
                Snapshot::builder()
                    .target_id(target_id)
                    .html("<html>already fresh content here</html>")
                    .text("already fresh content here")
                    .metadata(
                        SnapshotMetadata::builder()
                            .status_code(200)
                            .scrape_duration_ms(5)
                            .content_length(100)
                            .method("simple_scraper")
                            .build(),
                    )
                    .build(),
            )
            .await
            .unwrap();

        let driver = Arc::new(ScriptedScrapeDriver::new());
        let admission = Arc::new(AdmissionController::new(AdmissionConfig::default()));
        let evaluator = Arc::new(FreshnessEvaluator::new(store.clone(), FreshnessConfig::default()));
        let scheduler = Scheduler::new(store.clone(), driver.clone(), admission, evaluator, scheduler_config());

        let result = scheduler.check_and_trigger(project_id).await.unwrap();

        assert!(!result.triggered);
        assert_eq!(result.tasks_executed, 0);
        assert_eq!(driver.call_count(), 0);
    }

    #[tokio::test]
    async fn one_failing_target_does_not_abort_the_batch() {
        let store = Arc::new(InMemoryObjectStore::new());
        let project_id = seeded_project(&store);
        seeded_target(&store, project_id, "https://acme.test/good");
        seeded_target(&store, project_id, "https://acme.test/bad");

        let driver = Arc::new(
            ScriptedScrapeDriver::new()
                .with_snapshot("https://acme.test/good", sample_snapshot("https://acme.test/good"))
                .with_failure("https://acme.test/bad", ScrapeError::NetworkTimeout),
        );
        let admission = Arc::new(AdmissionController::new(AdmissionConfig::default()));
        let evaluator = Arc::new(FreshnessEvaluator::new(store.clone(), FreshnessConfig::default()));
        let scheduler = Scheduler::new(store.clone(), driver.clone(), admission, evaluator, scheduler_config());

        let result = scheduler.check_and_trigger(project_id).await.unwrap();

        assert_eq!(result.tasks_executed, 2);
        let successes = result.results.iter().filter(|r| r.success).count();
        let failures = result.results.iter().filter(|r| !r.success).count();
        assert_eq!(successes, 1);
        assert_eq!(failures, 1);
        assert!(result.results.iter().find(|r| !r.success).unwrap().error.is_some());
    }

    #[tokio::test]
    async fn second_scrape_of_same_domain_is_throttled() {
        let store = Arc::new(InMemoryObjectStore::new());
        let project_id = seeded_project(&store);
        seeded_target(&store, project_id, "https://throttled.test/one");
        seeded_target(&store, project_id, "https://throttled.test/two");

        let driver = Arc::new(
            ScriptedScrapeDriver::new()
                .with_snapshot("https://throttled.test/one", sample_snapshot("https://throttled.test/one"))
                .with_snapshot("https://throttled.test/two", sample_snapshot("https://throttled.test/two")),
        );
        let admission_config = AdmissionConfig {
            per_domain_throttle: std::time::Duration::from_secs(60),
            ..AdmissionConfig::default()
        };
        let admission = Arc::new(AdmissionController::new(admission_config));
        let evaluator = Arc::new(FreshnessEvaluator::new(store.clone(), FreshnessConfig::default()));
        let scheduler = Scheduler::new(store.clone(), driver.clone(), admission, evaluator, scheduler_config());

        let result = scheduler.check_and_trigger(project_id).await.unwrap();

        assert_eq!(result.tasks_executed, 2);
        let successes = result.results.iter().filter(|r| r.success).count();
        assert_eq!(successes, 1, "same-domain targets share a throttle window");
        assert_eq!(driver.call_count(), 1);
    }
}
