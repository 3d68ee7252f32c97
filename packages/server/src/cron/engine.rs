//! `CronEngine` (§4.3): owns the READY/ACTIVE/RUNNING/RETRY_SCHEDULED/
//! RECOVERY/PAUSED state machine for every `CronJob`, dispatches invocations
//! to handlers registered by `JobKind`, and drives a `tokio-cron-scheduler`
//! tick wheel the way the teacher's `scheduled_tasks.rs` drove its two
//! hardcoded jobs — generalized here to every job in the store.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job as SchedulerJob, JobScheduler};

use super::config::CronEngineConfig;
use super::errors::CronError;
use crate::domain::{CronJob, CronJobId, ErrorKind, JobExecution, JobExecutionStatus, JobKind, ProjectStatus};
use crate::external::object_store::ObjectStore;

/// What a registered handler returns: the output text on success, or a
/// classified failure so `CronEngine` can decide whether to retry.
pub type JobOutput = Result<String, JobFailure>;

#[derive(Debug, Clone)]
pub struct JobFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobFailure {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }
}

type BoxedHandler =
    Arc<dyn Fn(CronJob) -> Pin<Box<dyn Future<Output = JobOutput> + Send>> + Send + Sync>;

/// The six states named in §4.3. `Ready` is a scheduled job that has never
/// run; `Active` is a job that has completed at least one successful run and
/// is idle between invocations; `Paused` is operator-controlled and never
/// entered by the state machine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CronJobState {
    Ready,
    Active,
    Running,
    RetryScheduled,
    Recovery,
    Paused,
}

/// Health bucket from `performHealthChecks` (§4.3 "self-healing policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

pub struct CronEngine {
    store: Arc<dyn ObjectStore>,
    config: CronEngineConfig,
    handlers: RwLock<HashMap<JobKind, BoxedHandler>>,
    states: RwLock<HashMap<CronJobId, CronJobState>>,
}

impl CronEngine {
    pub fn new(store: Arc<dyn ObjectStore>, config: CronEngineConfig) -> Self {
        Self {
            store,
            config,
            handlers: RwLock::new(HashMap::new()),
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Registers the handler a `JobKind` dispatches to. One handler per kind;
    /// registering the same kind twice replaces the previous handler.
    pub async fn register_handler<F, Fut>(&self, kind: JobKind, handler: F)
    where
        F: Fn(CronJob) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobOutput> + Send + 'static,
    {
        let boxed: BoxedHandler = Arc::new(move |job| Box::pin(handler(job)));
        self.handlers.write().await.insert(kind, boxed);
    }

    pub async fn state_of(&self, id: CronJobId) -> Option<CronJobState> {
        self.states.read().await.get(&id).copied()
    }

    /// §4.3 `scheduleJob`: rejects an unparseable cron expression before ever
    /// touching storage, then persists the job and seeds its in-memory state.
    pub async fn schedule_job(&self, job: CronJob) -> Result<CronJob, CronError> {
        validate_cron_expression(&job.cron_expression)?;
        let active = job.active;
        let persisted = self.store.upsert_cron_job(job).await?;
        self.states
            .write()
            .await
            .insert(persisted.id, if active { CronJobState::Ready } else { CronJobState::Paused });
        Ok(persisted)
    }

    /// §4.3 `pauseJob`: operator-controlled, overrides the state machine.
    pub async fn pause_job(&self, id: CronJobId) -> Result<(), CronError> {
        self.store.set_cron_job_active(id, false).await?;
        self.states.write().await.insert(id, CronJobState::Paused);
        Ok(())
    }

    /// §4.3 `resumeJob`: returns to READY; the next tick re-evaluates eligibility.
    pub async fn resume_job(&self, id: CronJobId) -> Result<(), CronError> {
        self.store.set_cron_job_active(id, true).await?;
        self.states.write().await.insert(id, CronJobState::Ready);
        Ok(())
    }

    /// A bound job is only effectively active while both its own `active`
    /// flag and its project's status agree (§3 lifecycle rule); an unbound
    /// job (no `project_id`) is always eligible.
    async fn is_effectively_active(&self, job: &CronJob) -> Result<bool, CronError> {
        if !job.active {
            return Ok(false);
        }
        match job.project_id {
            None => Ok(true),
            Some(project_id) => {
                let project = self.store.find_project(project_id).await?;
                Ok(project.map(|p| p.status == ProjectStatus::Active).unwrap_or(false))
            }
        }
    }

    async fn find_job(&self, id: CronJobId) -> Result<CronJob, CronError> {
        self.store
            .list_active_cron_jobs()
            .await?
            .into_iter()
            .find(|job| job.id == id)
            .ok_or(CronError::JobNotFound(id))
    }

    /// §4.3 `triggerJob`: enforces single-concurrent-invocation, then runs
    /// the RUNNING → success | retry-until-exhausted → RECOVERY chain.
    pub async fn trigger_job(&self, id: CronJobId) -> Result<JobExecution, CronError> {
        let job = self.find_job(id).await?;
        if !self.is_effectively_active(&job).await? {
            return Err(CronError::JobNotFound(id));
        }

        {
            let mut states = self.states.write().await;
            if states.get(&id).copied() == Some(CronJobState::Running) {
                return Err(CronError::AlreadyRunning(id));
            }
            states.insert(id, CronJobState::Running);
        }

        let mut attempt = 1;
        loop {
            let execution = self.run_attempt(&job, attempt).await?;
            match execution.status {
                JobExecutionStatus::Success => {
                    self.on_success(&job).await?;
                    return Ok(execution);
                }
                JobExecutionStatus::Retry => {
                    self.states.write().await.insert(id, CronJobState::RetryScheduled);
                    tokio::time::sleep(job.base_retry_delay * attempt).await;
                    self.states.write().await.insert(id, CronJobState::Running);
                    attempt += 1;
                }
                JobExecutionStatus::Failed | JobExecutionStatus::Timeout => {
                    self.on_failure(&job).await?;
                    self.states.write().await.insert(id, CronJobState::Recovery);
                    return Ok(execution);
                }
                JobExecutionStatus::Running => unreachable!("run_attempt always resolves to a terminal status"),
            }
        }
    }

    /// Runs one attempt: records the in-progress attempt on the `CronJob`
    /// itself first (so a crash mid-handler leaves a trace for
    /// `recover_from_restart` to find without inflating the execution log),
    /// invokes the handler under the job's timeout, then persists the
    /// terminal outcome as the attempt's single `JobExecution` row.
    async fn run_attempt(&self, job: &CronJob, attempt: u32) -> Result<JobExecution, CronError> {
        let handler = self
            .handlers
            .read()
            .await
            .get(&job.kind)
            .cloned()
            .ok_or_else(|| CronError::InvalidCronExpression(format!("no handler registered for {:?}", job.kind)))?;

        let started_at = Utc::now();
        let mut running = job.clone();
        running.running_attempt = Some(attempt);
        running.running_since = Some(started_at);
        self.store.upsert_cron_job(running).await?;

        // `max_retries` counts retries beyond the initial attempt (§8 scenario 5):
        // attempt 1 is the initial run, so up to `max_retries` further attempts follow.
        let can_retry = attempt <= job.max_retries;
        let outcome = tokio::time::timeout(job.timeout, handler(job.clone())).await;
        let finished_at = Utc::now();

        let mut result = JobExecution::builder()
            .job_id(job.id)
            .attempt(attempt)
            .started_at(started_at)
            .status(JobExecutionStatus::Running)
            .build();
        result.finished_at = Some(finished_at);

        match outcome {
            Ok(Ok(output)) => {
                result.status = JobExecutionStatus::Success;
                result.output = Some(output);
            }
            Ok(Err(failure)) => {
                let retry = can_retry && failure.kind != ErrorKind::Permanent;
                result.status = if retry { JobExecutionStatus::Retry } else { JobExecutionStatus::Failed };
                result.error_kind = Some(failure.kind);
                result.error_message = Some(failure.message);
            }
            Err(_elapsed) => {
                result.status = if can_retry { JobExecutionStatus::Retry } else { JobExecutionStatus::Timeout };
                result.error_kind = Some(ErrorKind::Timeout);
                result.error_message = Some(format!("exceeded timeout of {:?}", job.timeout));
            }
        }

        let persisted = self.store.append_job_execution(result).await?;
        self.trim_executions(job.id).await?;

        let mut cleared = job.clone();
        cleared.running_attempt = None;
        cleared.running_since = None;
        self.store.upsert_cron_job(cleared).await?;

        Ok(persisted)
    }

    async fn on_success(&self, job: &CronJob) -> Result<(), CronError> {
        let mut updated = job.clone();
        updated.last_run_at = Some(Utc::now());
        updated.last_successful_run_at = Some(Utc::now());
        updated.consecutive_failures = 0;
        self.store.upsert_cron_job(updated).await?;
        self.states.write().await.insert(job.id, CronJobState::Active);
        Ok(())
    }

    async fn on_failure(&self, job: &CronJob) -> Result<(), CronError> {
        let mut updated = job.clone();
        updated.last_run_at = Some(Utc::now());
        updated.consecutive_failures += 1;
        self.store.upsert_cron_job(updated).await?;
        Ok(())
    }

    async fn trim_executions(&self, job_id: CronJobId) -> Result<(), CronError> {
        self.store
            .trim_job_executions(job_id, self.config.execution_retention)
            .await?;
        Ok(())
    }

    /// §4.3 `performHealthChecks`: buckets every active job by consecutive
    /// failures against `maxConsecutiveFailures`/`escalationThreshold`.
    pub async fn perform_health_checks(&self) -> Result<Vec<(CronJobId, JobHealth)>, CronError> {
        let jobs = self.store.list_active_cron_jobs().await?;
        Ok(jobs
            .into_iter()
            .map(|job| {
                let health = if job.consecutive_failures >= self.config.escalation_threshold {
                    JobHealth::Unhealthy
                } else if job.consecutive_failures >= self.config.max_consecutive_failures {
                    JobHealth::Degraded
                } else {
                    JobHealth::Healthy
                };
                (job.id, health)
            })
            .collect())
    }

    /// Crash recovery (§4.3): a `CronJob` whose `running_attempt` is still set
    /// means the process died mid-handler. Appends the `process_restart`
    /// failure as that attempt's terminal row and clears the in-progress
    /// marker, keeping the execution log append-only at one row per attempt.
    pub async fn recover_from_restart(&self) -> Result<(), CronError> {
        for job in self.store.list_active_cron_jobs().await? {
            let Some(attempt) = job.running_attempt else {
                continue;
            };
            let started_at = job.running_since.unwrap_or_else(Utc::now);

            let mut recovery = JobExecution::builder()
                .job_id(job.id)
                .attempt(attempt)
                .started_at(started_at)
                .status(JobExecutionStatus::Failed)
                .build();
            recovery.finished_at = Some(Utc::now());
            recovery.error_kind = Some(ErrorKind::Transient);
            recovery.error_message = Some("process_restart".to_string());
            self.store.append_job_execution(recovery).await?;
            self.trim_executions(job.id).await?;

            let mut cleared = job.clone();
            cleared.running_attempt = None;
            cleared.running_since = None;
            cleared.consecutive_failures += 1;
            self.store.upsert_cron_job(cleared).await?;

            self.states.write().await.insert(job.id, CronJobState::Recovery);
        }
        Ok(())
    }

    /// Builds and starts the tick wheel: one `tokio-cron-scheduler` entry per
    /// active `CronJob`, each dispatching into `trigger_job` on fire. Mirrors
    /// the teacher's `start_scheduler` wiring, generalized from two hardcoded
    /// jobs to whatever is in the store.
    pub async fn start(self: Arc<Self>) -> Result<JobScheduler, CronError> {
        let ticker = JobScheduler::new()
            .await
            .map_err(|e| CronError::InvalidCronExpression(e.to_string()))?;

        for job in self.store.list_active_cron_jobs().await? {
            let engine = self.clone();
            let job_id = job.id;
            let expression = job.cron_expression.clone();

            let scheduled = SchedulerJob::new_async(expression.as_str(), move |_uuid, _lock| {
                let engine = engine.clone();
                Box::pin(async move {
                    if let Err(error) = engine.trigger_job(job_id).await {
                        tracing::error!(job_id = %job_id, %error, "cron job invocation failed");
                    }
                })
            })
            .map_err(|e| CronError::InvalidCronExpression(format!("{expression}: {e}")))?;

            ticker
                .add(scheduled)
                .await
                .map_err(|e| CronError::InvalidCronExpression(e.to_string()))?;

            self.states
                .write()
                .await
                .insert(job_id, if job.active { CronJobState::Ready } else { CronJobState::Paused });
        }

        ticker
            .start()
            .await
            .map_err(|e| CronError::InvalidCronExpression(e.to_string()))?;

        Ok(ticker)
    }
}

/// Six-field (with seconds) cron expressions, UTC only (§9 decision).
fn validate_cron_expression(expression: &str) -> Result<(), CronError> {
    SchedulerJob::new_async(expression, |_uuid, _lock| Box::pin(async {}))
        .map(|_| ())
        .map_err(|e| CronError::InvalidCronExpression(format!("{expression}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::domain::JobKind;
    use crate::external::in_memory_store::InMemoryObjectStore;

    fn sample_job(kind: JobKind, max_retries: u32) -> CronJob {
        CronJob::builder()
            .name("test-job")
            .kind(kind)
            .cron_expression("0 0 3 * * *")
            .max_retries(max_retries)
            .base_retry_delay(std::time::Duration::from_millis(1))
            .build()
    }

    #[tokio::test]
    async fn schedule_job_rejects_invalid_cron_expression() {
        let store = Arc::new(InMemoryObjectStore::new());
        let engine = CronEngine::new(store, CronEngineConfig::default());
        let mut job = sample_job(JobKind::SystemMaintenance, 3);
        job.cron_expression = "not a cron expression".to_string();

        let result = engine.schedule_job(job).await;
        assert!(matches!(result, Err(CronError::InvalidCronExpression(_))));
    }

    #[tokio::test]
    async fn successful_run_resets_consecutive_failures_and_goes_active() {
        let store = Arc::new(InMemoryObjectStore::new());
        let engine = CronEngine::new(store, CronEngineConfig::default());
        engine
            .register_handler(JobKind::SystemMaintenance, |_job| async { Ok("ok".to_string()) })
            .await;

        let job = engine.schedule_job(sample_job(JobKind::SystemMaintenance, 3)).await.unwrap();
        let execution = engine.trigger_job(job.id).await.unwrap();

        assert_eq!(execution.status, JobExecutionStatus::Success);
        assert_eq!(engine.state_of(job.id).await, Some(CronJobState::Active));
    }

    #[tokio::test]
    async fn transient_failures_retry_then_exhaust_to_recovery() {
        let store = Arc::new(InMemoryObjectStore::new());
        let engine = CronEngine::new(store, CronEngineConfig::default());
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        engine
            .register_handler(JobKind::PeriodicAnalysis, move |_job| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(JobFailure::transient("backend unavailable"))
                }
            })
            .await;

        let job = engine.schedule_job(sample_job(JobKind::PeriodicAnalysis, 2)).await.unwrap();
        let execution = engine.trigger_job(job.id).await.unwrap();

        assert_eq!(execution.status, JobExecutionStatus::Failed);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(engine.state_of(job.id).await, Some(CronJobState::Recovery));
    }

    #[tokio::test]
    async fn permanent_failure_never_retries() {
        let store = Arc::new(InMemoryObjectStore::new());
        let engine = CronEngine::new(store, CronEngineConfig::default());
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        engine
            .register_handler(JobKind::ScheduledReport, move |_job| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(JobFailure::permanent("misconfigured report template"))
                }
            })
            .await;

        let job = engine.schedule_job(sample_job(JobKind::ScheduledReport, 5)).await.unwrap();
        engine.trigger_job(job.id).await.unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_trigger_is_rejected_while_running() {
        let store = Arc::new(InMemoryObjectStore::new());
        let engine = Arc::new(CronEngine::new(store, CronEngineConfig::default()));
        engine
            .register_handler(JobKind::SystemMaintenance, |_job| async {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                Ok("done".to_string())
            })
            .await;

        let job = engine.schedule_job(sample_job(JobKind::SystemMaintenance, 3)).await.unwrap();

        let engine_clone = engine.clone();
        let job_id = job.id;
        let first = tokio::spawn(async move { engine_clone.trigger_job(job_id).await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let second = engine.trigger_job(job.id).await;

        assert!(matches!(second, Err(CronError::AlreadyRunning(_))));
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn health_check_buckets_by_consecutive_failures() {
        let store = Arc::new(InMemoryObjectStore::new());
        let engine = CronEngine::new(store, CronEngineConfig::default());
        let mut degraded = sample_job(JobKind::FreshnessSweep, 1);
        degraded.consecutive_failures = 3;
        let mut unhealthy = sample_job(JobKind::FreshnessSweep, 1);
        unhealthy.consecutive_failures = 5;

        let degraded = engine.schedule_job(degraded).await.unwrap();
        let unhealthy = engine.schedule_job(unhealthy).await.unwrap();

        let report = engine.perform_health_checks().await.unwrap();
        let report: HashMap<_, _> = report.into_iter().collect();

        assert_eq!(report[&degraded.id], JobHealth::Degraded);
        assert_eq!(report[&unhealthy.id], JobHealth::Unhealthy);
    }
}
