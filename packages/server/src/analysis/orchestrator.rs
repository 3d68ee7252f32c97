//! AnalysisOrchestrator (§4.4): ensures input freshness, invokes
//! `AnalysisBackend`, validates output quality, persists an
//! `AnalysisRecord`, and tracks the time-to-first-analysis SLO.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::config::AnalysisConfig;
use super::errors::AnalysisError;
use crate::admission::Priority;
use crate::domain::{
    AnalysisQuality, AnalysisRecord, AnalysisRecordId, AnalysisType, ProjectId, TargetKind,
};
use crate::external::analysis_backend::{AnalysisBackend, Message};
use crate::external::object_store::{ObjectStore, ObjectStoreError};
use crate::freshness::{FreshnessEvaluator, ProjectFreshnessStatus};
use crate::scheduler::Scheduler;

/// §4.4 `monitorProject` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorResult {
    pub fresh_data_detected: bool,
    pub last_analysis_time: Option<chrono::DateTime<Utc>>,
    pub needs_analysis: bool,
    pub time_to_first_analysis_ms: Option<u64>,
    pub analysis_quality: AnalysisQuality,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct TriggerOptions {
    #[builder(default)]
    pub force_fresh_data: bool,
    #[builder(default = AnalysisType::Competitive)]
    pub analysis_type: AnalysisType,
    #[builder(default = Priority::Normal)]
    pub priority: Priority,
    #[builder(default, setter(strip_option, into))]
    pub report_template: Option<String>,
}

/// §4.4 `triggerAnalysis` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub analysis_id: Option<AnalysisRecordId>,
    pub report_id: Option<Uuid>,
    pub processing_time_ms: u64,
    pub error: Option<String>,
}

impl AnalysisResult {
    fn failure(processing_time_ms: u64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            analysis_id: None,
            report_id: None,
            processing_time_ms,
            error: Some(error.into()),
        }
    }
}

pub struct AnalysisOrchestrator {
    store: Arc<dyn ObjectStore>,
    scheduler: Arc<Scheduler>,
    evaluator: Arc<FreshnessEvaluator>,
    backend: Arc<dyn AnalysisBackend>,
    config: AnalysisConfig,
    in_flight: Mutex<HashMap<ProjectId, broadcast::Sender<Arc<AnalysisResult>>>>,
}

impl AnalysisOrchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        scheduler: Arc<Scheduler>,
        evaluator: Arc<FreshnessEvaluator>,
        backend: Arc<dyn AnalysisBackend>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            store,
            scheduler,
            evaluator,
            backend,
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// §4.4 `monitorProject`.
    pub async fn monitor_project(&self, project_id: ProjectId) -> Result<MonitorResult, ObjectStoreError> {
        let project = self.store.find_project(project_id).await?.ok_or(ObjectStoreError::NotFound)?;
        let freshness = self.evaluator.freshness_status(project_id).await?;
        let latest_analysis = self.store.latest_analysis_by_project(project_id).await?;

        let needs_analysis = needs_analysis(freshness.status, project.last_analysis_at, Utc::now(), &self.config);
        let time_to_first_analysis_ms = project.last_analysis_at.map(|at| {
            (at - project.created_at).num_milliseconds().max(0) as u64
        });

        Ok(MonitorResult {
            fresh_data_detected: freshness.status == ProjectFreshnessStatus::Fresh,
            last_analysis_time: project.last_analysis_at,
            needs_analysis,
            time_to_first_analysis_ms,
            analysis_quality: latest_analysis.map(|a| a.quality).unwrap_or(AnalysisQuality::Failed),
        })
    }

    /// §4.4 `triggerAnalysis`, with per-project in-flight coalescing (§9):
    /// a concurrent call for a project already running observes the first
    /// call's result rather than starting a second run.
    pub async fn trigger_analysis(&self, project_id: ProjectId, options: TriggerOptions) -> AnalysisResult {
        if let Some(mut rx) = self.subscribe_if_running(project_id) {
            if let Ok(result) = rx.recv().await {
                return (*result).clone();
            }
        }

        let (tx, leader) = {
            let mut in_flight = self.in_flight.lock().unwrap();
            match in_flight.get(&project_id) {
                Some(existing) => (None, Some(existing.subscribe())),
                None => {
                    let (tx, _rx) = broadcast::channel(1);
                    in_flight.insert(project_id, tx.clone());
                    (Some(tx), None)
                }
            }
        };

        if let Some(mut rx) = leader {
            return match rx.recv().await {
                Ok(result) => (*result).clone(),
                Err(_) => Box::pin(self.trigger_analysis(project_id, options)).await,
            };
        }

        let tx = tx.expect("leader branch always holds a sender");
        let started = Utc::now();
        let result = self.run_trigger_analysis(project_id, &options, started).await;

        self.in_flight.lock().unwrap().remove(&project_id);
        let _ = tx.send(Arc::new(result.clone()));
        result
    }

    fn subscribe_if_running(&self, project_id: ProjectId) -> Option<broadcast::Receiver<Arc<AnalysisResult>>> {
        self.in_flight.lock().unwrap().get(&project_id).map(|tx| tx.subscribe())
    }

    async fn run_trigger_analysis(
        &self,
        project_id: ProjectId,
        options: &TriggerOptions,
        started: chrono::DateTime<Utc>,
    ) -> AnalysisResult {
        match self.run_trigger_analysis_inner(project_id, options, started).await {
            Ok(result) => result,
            Err(error) => {
                let processing_time_ms = (Utc::now() - started).num_milliseconds().max(0) as u64;
                tracing::error!(project_id = %project_id, error = %error, "analysis trigger failed");
                AnalysisResult::failure(processing_time_ms, error.to_string())
            }
        }
    }

    async fn run_trigger_analysis_inner(
        &self,
        project_id: ProjectId,
        options: &TriggerOptions,
        started: chrono::DateTime<Utc>,
    ) -> Result<AnalysisResult, AnalysisError> {
        // Step 1: load project, products, competitors; fail fast if both empty.
        let targets = self.store.list_targets(project_id).await?;
        let products: Vec<_> = targets.iter().filter(|t| t.kind == TargetKind::Product).cloned().collect();
        let competitors: Vec<_> = targets.iter().filter(|t| t.kind == TargetKind::Competitor).cloned().collect();
        if products.is_empty() && competitors.is_empty() {
            return Err(AnalysisError::NoTargets);
        }

        // Step 2: refresh stale/missing data first, awaiting the batch
        // directly (§9) rather than sleeping before re-reading freshness.
        let freshness = self.evaluator.freshness_status(project_id).await?;
        if options.force_fresh_data || freshness.status != ProjectFreshnessStatus::Fresh {
            let outcome = self.scheduler.check_and_trigger(project_id).await?;
            tracing::info!(
                project_id = %project_id,
                tasks_executed = outcome.tasks_executed,
                "refreshed inputs before analysis"
            );
        }

        // Step 3: build the analysis request context from the latest N
        // snapshots per target.
        let product_ids: Vec<_> = products.iter().map(|t| t.id).collect();
        let competitor_ids: Vec<_> = competitors.iter().map(|t| t.id).collect();
        let product_snapshots_flat = self
            .store
            .latest_snapshots_by_targets(&product_ids, self.config.snapshots_per_target)
            .await?;
        let competitor_snapshots_flat = self
            .store
            .latest_snapshots_by_targets(&competitor_ids, self.config.snapshots_per_target)
            .await?;

        let input_snapshot_ids: Vec<_> = product_snapshots_flat
            .iter()
            .chain(competitor_snapshots_flat.iter())
            .map(|s| s.id)
            .collect();

        let product_snapshots = group_by_target(product_snapshots_flat);
        let competitor_snapshots = group_by_target(competitor_snapshots_flat);
        let messages = build_request_messages(options.analysis_type, &products, &competitors, &product_snapshots, &competitor_snapshots);

        // Step 4 + 5: invoke the backend with bounded retries and validate
        // output quality; a too-short response is retried like a backend
        // failure.
        let (content, attempts) = self.invoke_with_retries(&messages).await?;

        // Step 6: persist and enqueue the downstream report request.
        let quality = classify_quality(&content, self.config.min_analysis_content_length);
        let record = AnalysisRecord::builder()
            .project_id(project_id)
            .analysis_type(options.analysis_type)
            .input_snapshot_ids(input_snapshot_ids)
            .content(content)
            .quality(quality)
            .attempt_count(attempts)
            .build();
        let record = self.store.create_analysis_record(record).await?;
        self.store.touch_project_analysis(project_id).await?;

        let report_id = Uuid::new_v4();
        tracing::info!(
            project_id = %project_id,
            analysis_id = %record.id,
            report_id = %report_id,
            template = options.report_template.as_deref().unwrap_or("default"),
            priority = ?options.priority,
            "enqueued report-generation request"
        );

        let processing_time_ms = (Utc::now() - started).num_milliseconds().max(0) as u64;
        if Duration::from_millis(processing_time_ms) < self.config.target_time_to_analysis {
            tracing::info!(project_id = %project_id, processing_time_ms, "TARGET_MET");
        } else {
            tracing::warn!(project_id = %project_id, processing_time_ms, "TARGET_EXCEEDED");
        }

        Ok(AnalysisResult {
            success: true,
            analysis_id: Some(record.id),
            report_id: Some(report_id),
            processing_time_ms,
            error: None,
        })
    }

    async fn invoke_with_retries(&self, messages: &[Message]) -> Result<(String, u32), AnalysisError> {
        let mut last_error = String::new();
        let max_attempts = self.config.analysis_max_retries.max(1);

        for attempt in 1..=max_attempts {
            match self.backend.generate_completion(messages).await {
                Ok(content) if content.len() >= self.config.min_analysis_content_length => return Ok((content, attempt)),
                Ok(content) => {
                    last_error = format!("output too short: {} chars", content.len());
                }
                Err(error) => last_error = error.to_string(),
            }

            if attempt < max_attempts {
                let backoff_ms = (self.config.backoff_base.as_millis() as u64)
                    .saturating_mul(2u64.saturating_pow(attempt - 1))
                    .min(self.config.backoff_max.as_millis() as u64)
                    + rand::thread_rng().gen_range(0..250);
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(AnalysisError::BackendExhausted {
            attempts: max_attempts,
            message: last_error,
        })
    }
}

fn group_by_target(snapshots: Vec<crate::domain::Snapshot>) -> HashMap<crate::domain::TargetId, Vec<crate::domain::Snapshot>> {
    let mut grouped: HashMap<crate::domain::TargetId, Vec<crate::domain::Snapshot>> = HashMap::new();
    for snapshot in snapshots {
        grouped.entry(snapshot.target_id).or_default().push(snapshot);
    }
    grouped
}

/// §4.4 `needsAnalysis` policy.
fn needs_analysis(
    status: ProjectFreshnessStatus,
    last_analysis_at: Option<chrono::DateTime<Utc>>,
    now: chrono::DateTime<Utc>,
    config: &AnalysisConfig,
) -> bool {
    let Some(last) = last_analysis_at else {
        return true;
    };
    let since = now - last;
    match status {
        ProjectFreshnessStatus::Fresh => since > chrono::Duration::from_std(config.fresh_reanalysis_after).unwrap_or_default(),
        ProjectFreshnessStatus::Stale => since > chrono::Duration::from_std(config.stale_reanalysis_after).unwrap_or_default(),
        ProjectFreshnessStatus::MissingData | ProjectFreshnessStatus::Mixed => false,
    }
}

fn classify_quality(content: &str, minimum: usize) -> AnalysisQuality {
    if content.len() >= minimum * 5 {
        AnalysisQuality::High
    } else if content.len() >= minimum * 2 {
        AnalysisQuality::Medium
    } else {
        AnalysisQuality::Low
    }
}

fn build_request_messages(
    analysis_type: AnalysisType,
    products: &[crate::domain::Target],
    competitors: &[crate::domain::Target],
    product_snapshots: &HashMap<crate::domain::TargetId, Vec<crate::domain::Snapshot>>,
    competitor_snapshots: &HashMap<crate::domain::TargetId, Vec<crate::domain::Snapshot>>,
) -> Vec<Message> {
    let kind_label = match analysis_type {
        AnalysisType::Competitive => "a competitive analysis",
        AnalysisType::Trend => "a trend analysis",
        AnalysisType::Comprehensive => "a comprehensive analysis",
    };
    let system = Message::system(format!(
        "You are producing {kind_label} from scraped product and competitor pages. \
         Summarize notable changes, pricing moves, and positioning shifts."
    ));

    let mut prompt = String::new();
    prompt.push_str("## Our products\n");
    append_targets(&mut prompt, products, product_snapshots);
    prompt.push_str("\n## Competitors\n");
    append_targets(&mut prompt, competitors, competitor_snapshots);

    vec![system, Message::user(prompt)]
}

fn append_targets(
    prompt: &mut String,
    targets: &[crate::domain::Target],
    snapshots: &HashMap<crate::domain::TargetId, Vec<crate::domain::Snapshot>>,
) {
    for target in targets {
        prompt.push_str(&format!("- {} ({})\n", target.display_name, target.url));
        for snapshot in snapshots.get(&target.id).into_iter().flatten() {
            let summary = crate::common::generate_summary(&snapshot.text, 500);
            prompt.push_str(&format!("  captured {}: {}\n", snapshot.captured_at, summary));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Project, Snapshot, SnapshotMetadata, Target};
    use crate::external::in_memory_store::InMemoryObjectStore;
    use crate::external::scripted_analysis_backend::ScriptedAnalysisBackend;
    use crate::external::ScriptedScrapeDriver;
    use crate::freshness::config::FreshnessConfig;
    use crate::scheduler::config::SchedulerConfig;
    use crate::admission::{AdmissionConfig, AdmissionController};

    fn orchestrator(
        store: Arc<InMemoryObjectStore>,
        backend: Arc<ScriptedAnalysisBackend>,
        driver: Arc<ScriptedScrapeDriver>,
    ) -> AnalysisOrchestrator {
        let admission = Arc::new(AdmissionController::new(AdmissionConfig::default()));
        let evaluator = Arc::new(FreshnessEvaluator::new(store.clone(), FreshnessConfig::default()));
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            driver,
            admission,
            evaluator.clone(),
            SchedulerConfig::default(),
        ));
        AnalysisOrchestrator::new(store, scheduler, evaluator, backend, AnalysisConfig::default())
    }

    fn product(project_id: ProjectId) -> Target {
        Target::builder()
            .project_id(project_id)
            .kind(TargetKind::Product)
            .display_name("Our widget")
            .url("https://example.com/widget")
            .build()
    }

    fn competitor(project_id: ProjectId) -> Target {
        Target::builder()
            .project_id(project_id)
            .kind(TargetKind::Competitor)
            .display_name("Acme widget")
            .url("https://acme.test/widget")
            .build()
    }

    fn snapshot(target_id: crate::domain::TargetId) -> Snapshot {
        Snapshot::builder()
            .target_id(target_id)
            .html("<html>fresh</html>")
            .text("the competitor cut prices 10% this week")
            .metadata(
                SnapshotMetadata::builder()
                    .status_code(200)
                    .scrape_duration_ms(10)
                    .content_length(400)
                    .method("simple_scraper")
                    .build(),
            )
            .build()
    }

    #[tokio::test]
    async fn fails_fast_with_no_targets() {
        let store = Arc::new(InMemoryObjectStore::new());
        let project = Project::builder().name("Empty Co").build();
        store.seed_project(project.clone());
        let backend = Arc::new(ScriptedAnalysisBackend::new());
        let driver = Arc::new(ScriptedScrapeDriver::new());

        let orchestrator = orchestrator(store, backend, driver);
        let result = orchestrator.trigger_analysis(project.id, TriggerOptions::builder().build()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no products or competitors"));
    }

    #[tokio::test]
    async fn persists_analysis_record_on_success() {
        let store = Arc::new(InMemoryObjectStore::new());
        let project = Project::builder().name("Acme Co").build();
        store.seed_project(project.clone());
        let product = product(project.id);
        let competitor = competitor(project.id);
        store.seed_target(product.clone());
        store.seed_target(competitor.clone());
        store.create_snapshot(snapshot(product.id)).await.unwrap();
        store.create_snapshot(snapshot(competitor.id)).await.unwrap();

        let backend = Arc::new(
            ScriptedAnalysisBackend::new()
                .with_response("Competitor Acme dropped prices 12% across its widget line this week, a clear share grab."),
        );
        let driver = Arc::new(ScriptedScrapeDriver::new());
        let orchestrator = orchestrator(store.clone(), backend, driver);

        let result = orchestrator.trigger_analysis(project.id, TriggerOptions::builder().build()).await;
        assert!(result.success);
        assert!(result.analysis_id.is_some());
        assert!(result.report_id.is_some());

        let record = store.latest_analysis_by_project(project.id).await.unwrap().unwrap();
        assert_eq!(record.id, result.analysis_id.unwrap());
    }

    #[tokio::test]
    async fn retries_on_low_quality_output_then_fails() {
        let store = Arc::new(InMemoryObjectStore::new());
        let project = Project::builder().name("Acme Co").build();
        store.seed_project(project.clone());
        let product = product(project.id);
        store.seed_target(product.clone());
        store.create_snapshot(snapshot(product.id)).await.unwrap();

        let backend = Arc::new(
            ScriptedAnalysisBackend::new()
                .with_response("too short")
                .with_response("still too short")
                .with_response("also too short"),
        );
        let driver = Arc::new(ScriptedScrapeDriver::new());
        let orchestrator = orchestrator(store, backend.clone(), driver);

        let options = TriggerOptions::builder().build();
        let result = orchestrator.trigger_analysis(project.id, options).await;
        assert!(!result.success);
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn needs_analysis_true_when_never_analysed() {
        assert!(needs_analysis(ProjectFreshnessStatus::Fresh, None, Utc::now(), &AnalysisConfig::default()));
    }

    #[tokio::test]
    async fn needs_analysis_false_for_recently_analysed_fresh_project() {
        let now = Utc::now();
        let config = AnalysisConfig::default();
        assert!(!needs_analysis(ProjectFreshnessStatus::Fresh, Some(now - chrono::Duration::hours(1)), now, &config));
        assert!(needs_analysis(ProjectFreshnessStatus::Fresh, Some(now - chrono::Duration::hours(5)), now, &config));
    }

    #[tokio::test]
    async fn coalesces_concurrent_triggers_for_same_project() {
        let store = Arc::new(InMemoryObjectStore::new());
        let project = Project::builder().name("Acme Co").build();
        store.seed_project(project.clone());
        let product = product(project.id);
        store.seed_target(product.clone());
        store.create_snapshot(snapshot(product.id)).await.unwrap();

        let backend = Arc::new(
            ScriptedAnalysisBackend::new()
                .with_response("Competitor raised prices across the board this quarter, a meaningful signal."),
        );
        let driver = Arc::new(ScriptedScrapeDriver::new());
        let orchestrator = Arc::new(orchestrator(store, backend, driver));

        let a = orchestrator.clone();
        let b = orchestrator.clone();
        let (r1, r2) = tokio::join!(
            a.trigger_analysis(project.id, TriggerOptions::builder().build()),
            b.trigger_analysis(project.id, TriggerOptions::builder().build()),
        );
        assert!(r1.success);
        assert!(r2.success);
        assert_eq!(r1.analysis_id, r2.analysis_id);
    }
}
