//! HealthSupervisor (§4.5): periodic multi-dimensional health evaluation
//! plus cooldown-gated remediation actions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::HealthSupervisorConfig;
use crate::admission::AdmissionController;
use crate::cron::{CronEngine, JobHealth};
use crate::domain::{CircuitStatus, ProjectStatus};
use crate::external::object_store::ObjectStore;
use crate::freshness::{FreshnessEvaluator, ProjectFreshnessStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Healthy,
    Warning,
    Critical,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealthStatus {
    pub score: u8,
    pub services: HashMap<String, ServiceStatus>,
    pub active_issues: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemediationActionKind {
    ClearCache,
    ReduceLoad,
    ResourceCleanup,
    RestartService,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemediationStatus {
    Succeeded,
    Failed,
    SkippedCooldown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationOutcome {
    pub action: RemediationActionKind,
    pub status: RemediationStatus,
    pub effectiveness: f64,
    pub detail: String,
    pub triggered_at: DateTime<Utc>,
}

impl RemediationOutcome {
    fn succeeded(action: RemediationActionKind, at: DateTime<Utc>, detail: impl Into<String>, effectiveness: f64) -> Self {
        Self {
            action,
            status: RemediationStatus::Succeeded,
            effectiveness,
            detail: detail.into(),
            triggered_at: at,
        }
    }

    fn failed(action: RemediationActionKind, at: DateTime<Utc>, detail: impl Into<String>) -> Self {
        Self {
            action,
            status: RemediationStatus::Failed,
            effectiveness: 0.0,
            detail: detail.into(),
            triggered_at: at,
        }
    }
}

pub struct HealthSupervisor {
    store: Arc<dyn ObjectStore>,
    admission: Arc<AdmissionController>,
    cron: Arc<CronEngine>,
    evaluator: Arc<FreshnessEvaluator>,
    config: HealthSupervisorConfig,
    last_triggered: Mutex<HashMap<RemediationActionKind, DateTime<Utc>>>,
}

impl HealthSupervisor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        admission: Arc<AdmissionController>,
        cron: Arc<CronEngine>,
        evaluator: Arc<FreshnessEvaluator>,
        config: HealthSupervisorConfig,
    ) -> Self {
        Self {
            store,
            admission,
            cron,
            evaluator,
            config,
            last_triggered: Mutex::new(HashMap::new()),
        }
    }

    /// §4.5 periodic action: snapshots circuit/job/freshness/business
    /// health into one scored status.
    pub async fn evaluate(&self) -> anyhow::Result<SystemHealthStatus> {
        let now = Utc::now();
        let mut services = HashMap::new();
        let mut active_issues = Vec::new();
        let mut recommended_actions = Vec::new();

        let circuit_status = circuit_service_status(self.admission.circuit_snapshot(now).status);
        note_issue(&mut active_issues, &mut recommended_actions, circuit_status, || {
            ("circuit breaker is not CLOSED".to_string(), "reset the circuit breaker once the backend recovers".to_string())
        });
        services.insert("circuit_breaker".to_string(), circuit_status);

        let job_healths = self.cron.perform_health_checks().await?;
        let cron_status = cron_service_status(&job_healths);
        note_issue(&mut active_issues, &mut recommended_actions, cron_status, || {
            (
                format!("{} cron job(s) unhealthy or degraded", job_healths.iter().filter(|(_, h)| *h != JobHealth::Healthy).count()),
                "investigate failing cron jobs and consider pausing them".to_string(),
            )
        });
        services.insert("cron".to_string(), cron_status);

        let (freshness_status, stale_projects) = self.freshness_health().await?;
        note_issue(&mut active_issues, &mut recommended_actions, freshness_status, || {
            (
                format!("{stale_projects} active project(s) missing fresh data"),
                "trigger scraping for affected projects".to_string(),
            )
        });
        services.insert("freshness".to_string(), freshness_status);

        let business_status = self.business_health(now).await?;
        note_issue(&mut active_issues, &mut recommended_actions, business_status, || {
            ("analysis success rate over the last 24h is degraded".to_string(), "review analysis backend availability".to_string())
        });
        services.insert("analysis".to_string(), business_status);

        let score = score_services(services.values().copied());

        Ok(SystemHealthStatus {
            score,
            services,
            active_issues,
            recommended_actions,
            checked_at: now,
        })
    }

    async fn freshness_health(&self) -> anyhow::Result<(ServiceStatus, usize)> {
        let projects = self.store.list_projects(Some(ProjectStatus::Active)).await?;
        let mut stale_or_missing = 0usize;
        for project in &projects {
            let freshness = self.evaluator.freshness_status(project.id).await?;
            if matches!(freshness.status, ProjectFreshnessStatus::MissingData | ProjectFreshnessStatus::Stale) {
                stale_or_missing += 1;
            }
        }
        if projects.is_empty() {
            return Ok((ServiceStatus::Unknown, 0));
        }
        let ratio = stale_or_missing as f64 / projects.len() as f64;
        let status = if ratio > 0.5 {
            ServiceStatus::Critical
        } else if ratio > 0.2 {
            ServiceStatus::Warning
        } else {
            ServiceStatus::Healthy
        };
        Ok((status, stale_or_missing))
    }

    async fn business_health(&self, now: DateTime<Utc>) -> anyhow::Result<ServiceStatus> {
        let projects = self.store.list_projects(Some(ProjectStatus::Active)).await?;
        let mut total = 0u32;
        let mut successful = 0u32;
        for project in &projects {
            if let Some(record) = self.store.latest_analysis_by_project(project.id).await? {
                if now - record.created_at <= chrono::Duration::hours(24) {
                    total += 1;
                    if !matches!(record.quality, crate::domain::AnalysisQuality::Failed) {
                        successful += 1;
                    }
                }
            }
        }
        if total == 0 {
            return Ok(ServiceStatus::Unknown);
        }
        let rate = successful as f64 / total as f64;
        Ok(if rate < 0.5 {
            ServiceStatus::Critical
        } else if rate < 0.8 {
            ServiceStatus::Warning
        } else {
            ServiceStatus::Healthy
        })
    }

    /// §4.5 remediation action, gated by the action's own cooldown
    /// (invariant: never re-invoked within `cooldownPeriodMs`).
    pub async fn remediate(&self, action: RemediationActionKind) -> RemediationOutcome {
        let now = Utc::now();
        let cooldown = chrono::Duration::from_std(self.config.cooldown_period).unwrap_or_default();
        {
            let mut last = self.last_triggered.lock().unwrap();
            if let Some(&previous) = last.get(&action) {
                if now - previous < cooldown {
                    return RemediationOutcome {
                        action,
                        status: RemediationStatus::SkippedCooldown,
                        effectiveness: 0.0,
                        detail: "cooldown still active".to_string(),
                        triggered_at: now,
                    };
                }
            }
            last.insert(action, now);
        }

        match action {
            RemediationActionKind::ClearCache => {
                if !self.config.clear_cache_enabled {
                    return RemediationOutcome::failed(action, now, "CLEAR_CACHE is disabled");
                }
                let (domains, projects) = self.admission.throttle_counts();
                self.admission.clear_throttles();
                RemediationOutcome::succeeded(
                    action,
                    now,
                    format!("cleared {domains} domain and {projects} project throttle entries"),
                    1.0,
                )
            }
            RemediationActionKind::ReduceLoad => {
                if !self.config.reduce_load_enabled {
                    return RemediationOutcome::failed(action, now, "REDUCE_LOAD is disabled");
                }
                let current = self.admission.global_concurrency_limit();
                let reduced = ((current as f64) * self.config.reduce_load_factor).floor().max(1.0) as usize;
                self.admission.set_global_concurrency_limit(reduced);
                RemediationOutcome::succeeded(action, now, format!("reduced global concurrency {current} -> {reduced}"), 1.0)
            }
            RemediationActionKind::ResourceCleanup => {
                if !self.config.resource_cleanup_enabled {
                    return RemediationOutcome::failed(action, now, "RESOURCE_CLEANUP is disabled");
                }
                match self.cleanup_resources().await {
                    Ok(removed) => RemediationOutcome::succeeded(
                        action,
                        now,
                        format!("evicted {removed} stale record(s)"),
                        if removed > 0 { 1.0 } else { 0.5 },
                    ),
                    Err(error) => RemediationOutcome::failed(action, now, error.to_string()),
                }
            }
            RemediationActionKind::RestartService => {
                tracing::warn!("RESTART_SERVICE requested; restart is never performed automatically, raising operational signal only");
                RemediationOutcome::failed(action, now, "restart is operator-only; signal raised")
            }
        }
    }

    async fn cleanup_resources(&self) -> Result<u64, crate::external::object_store::ObjectStoreError> {
        let mut removed = 0u64;
        let projects = self.store.list_projects(None).await?;
        for project in &projects {
            for target in self.store.list_targets(project.id).await? {
                removed += self
                    .store
                    .delete_snapshots_older_than(target.id, self.config.snapshot_retention_per_target)
                    .await?;
            }
        }
        for job in self.store.list_active_cron_jobs().await? {
            removed += self.store.trim_job_executions(job.id, self.config.execution_retention).await?;
        }
        Ok(removed)
    }
}

fn circuit_service_status(status: CircuitStatus) -> ServiceStatus {
    match status {
        CircuitStatus::Closed => ServiceStatus::Healthy,
        CircuitStatus::HalfOpen => ServiceStatus::Warning,
        CircuitStatus::Open => ServiceStatus::Critical,
    }
}

fn cron_service_status(job_healths: &[(crate::domain::CronJobId, JobHealth)]) -> ServiceStatus {
    if job_healths.is_empty() {
        return ServiceStatus::Unknown;
    }
    if job_healths.iter().any(|(_, h)| *h == JobHealth::Unhealthy) {
        ServiceStatus::Critical
    } else if job_healths.iter().any(|(_, h)| *h == JobHealth::Degraded) {
        ServiceStatus::Warning
    } else {
        ServiceStatus::Healthy
    }
}

fn note_issue(
    active_issues: &mut Vec<String>,
    recommended_actions: &mut Vec<String>,
    status: ServiceStatus,
    describe: impl FnOnce() -> (String, String),
) {
    if matches!(status, ServiceStatus::Warning | ServiceStatus::Critical) {
        let (issue, action) = describe();
        active_issues.push(issue);
        recommended_actions.push(action);
    }
}

fn score_services(statuses: impl Iterator<Item = ServiceStatus>) -> u8 {
    let mut score: i32 = 100;
    for status in statuses {
        score -= match status {
            ServiceStatus::Healthy => 0,
            ServiceStatus::Warning => 10,
            ServiceStatus::Critical => 25,
            ServiceStatus::Unknown => 5,
        };
    }
    score.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmissionConfig;
    use crate::cron::CronEngineConfig;
    use crate::domain::Project;
    use crate::external::in_memory_store::InMemoryObjectStore;
    use crate::freshness::FreshnessConfig;

    fn supervisor(store: Arc<InMemoryObjectStore>) -> HealthSupervisor {
        let admission = Arc::new(AdmissionController::new(AdmissionConfig::default()));
        let cron = Arc::new(CronEngine::new(store.clone(), CronEngineConfig::default()));
        let evaluator = Arc::new(FreshnessEvaluator::new(store.clone(), FreshnessConfig::default()));
        HealthSupervisor::new(store, admission, cron, evaluator, HealthSupervisorConfig::default())
    }

    #[tokio::test]
    async fn evaluate_reports_unknown_services_with_no_data() {
        let store = Arc::new(InMemoryObjectStore::new());
        let supervisor = supervisor(store);
        let status = supervisor.evaluate().await.unwrap();
        assert_eq!(status.services.get("cron"), Some(&ServiceStatus::Unknown));
        assert_eq!(status.services.get("freshness"), Some(&ServiceStatus::Unknown));
    }

    #[tokio::test]
    async fn clear_cache_remediation_is_gated_by_cooldown() {
        let store = Arc::new(InMemoryObjectStore::new());
        let supervisor = supervisor(store);

        let first = supervisor.remediate(RemediationActionKind::ClearCache).await;
        assert_eq!(first.status, RemediationStatus::Succeeded);

        let second = supervisor.remediate(RemediationActionKind::ClearCache).await;
        assert_eq!(second.status, RemediationStatus::SkippedCooldown);
    }

    #[tokio::test]
    async fn restart_service_never_succeeds_automatically() {
        let store = Arc::new(InMemoryObjectStore::new());
        let supervisor = supervisor(store);
        let outcome = supervisor.remediate(RemediationActionKind::RestartService).await;
        assert_eq!(outcome.status, RemediationStatus::Failed);
        assert_eq!(outcome.effectiveness, 0.0);
    }

    #[tokio::test]
    async fn reduce_load_lowers_global_concurrency_limit() {
        let store = Arc::new(InMemoryObjectStore::new());
        let admission = Arc::new(AdmissionController::new(AdmissionConfig::default()));
        let cron = Arc::new(CronEngine::new(store.clone(), CronEngineConfig::default()));
        let evaluator = Arc::new(FreshnessEvaluator::new(store.clone(), FreshnessConfig::default()));
        let before = admission.global_concurrency_limit();
        let supervisor = HealthSupervisor::new(store, admission.clone(), cron, evaluator, HealthSupervisorConfig::default());

        let outcome = supervisor.remediate(RemediationActionKind::ReduceLoad).await;
        assert_eq!(outcome.status, RemediationStatus::Succeeded);
        assert!(admission.global_concurrency_limit() < before);
    }

    #[tokio::test]
    async fn score_reflects_issue_severity() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.seed_project(Project::builder().name("Acme").build());
        let supervisor = supervisor(store);
        let status = supervisor.evaluate().await.unwrap();
        assert!(status.score <= 100);
    }
}
