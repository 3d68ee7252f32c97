//! Handler functions for the §6.4 management surface. Each mirrors one row
//! of that table; request/response bodies are the thinnest JSON wrapper
//! around the collaborator types the handler delegates to.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::admission::Priority;
use crate::analysis::TriggerOptions;
use crate::domain::{AnalysisType, CronJob, CronJobId, JobKind, ProjectId};
use crate::freshness::ProjectFreshness;
use crate::health::SystemHealthStatus;
use crate::scheduler::CheckAndTriggerResult;

use super::error::ApiError;
use super::state::AppState;

pub async fn get_health(Extension(state): Extension<AppState>) -> Result<Json<SystemHealthStatus>, ApiError> {
    let status = state.health.evaluate().await.map_err(|error| ApiError::Internal(error.to_string()))?;
    Ok(Json(status))
}

pub async fn get_project_freshness(
    Extension(state): Extension<AppState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<ProjectFreshness>, ApiError> {
    let freshness = state.evaluator.freshness_status(project_id).await?;
    Ok(Json(freshness))
}

pub async fn trigger_scraping(
    Extension(state): Extension<AppState>,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<CheckAndTriggerResult>, ApiError> {
    let result = state.scheduler.check_and_trigger(project_id).await?;
    Ok(Json(result))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerAnalysisRequest {
    #[serde(default)]
    pub force_fresh_data: bool,
    pub analysis_type: Option<AnalysisType>,
    pub priority: Option<Priority>,
    pub report_template: Option<String>,
}

pub async fn trigger_analysis(
    Extension(state): Extension<AppState>,
    Path(project_id): Path<ProjectId>,
    body: Option<Json<TriggerAnalysisRequest>>,
) -> Json<crate::analysis::AnalysisResult> {
    let request = body.map(|Json(body)| body).unwrap_or_default();
    let options = TriggerOptions {
        force_fresh_data: request.force_fresh_data,
        analysis_type: request.analysis_type.unwrap_or(AnalysisType::Competitive),
        priority: request.priority.unwrap_or(Priority::Normal),
        report_template: request.report_template,
    };
    Json(state.analysis.trigger_analysis(project_id, options).await)
}

#[derive(Debug, Serialize)]
pub struct CronJobSummary {
    #[serde(flatten)]
    pub job: CronJob,
    pub state: Option<crate::cron::CronJobState>,
}

pub async fn list_jobs(Extension(state): Extension<AppState>) -> Result<Json<Vec<CronJobSummary>>, ApiError> {
    let jobs = state.store.list_active_cron_jobs().await?;
    let mut summaries = Vec::with_capacity(jobs.len());
    for job in jobs {
        let job_state = state.cron.state_of(job.id).await;
        summaries.push(CronJobSummary { job, state: job_state });
    }
    Ok(Json(summaries))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleJobRequest {
    pub name: String,
    pub kind: JobKind,
    pub cron_expression: String,
    pub project_id: Option<ProjectId>,
    pub max_retries: Option<u32>,
    pub base_retry_delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

pub async fn schedule_job(
    Extension(state): Extension<AppState>,
    Json(request): Json<ScheduleJobRequest>,
) -> Result<Json<CronJob>, ApiError> {
    let job = CronJob {
        id: CronJobId::new(),
        name: request.name,
        kind: request.kind,
        cron_expression: request.cron_expression,
        active: true,
        max_retries: request.max_retries.unwrap_or(3),
        base_retry_delay: request.base_retry_delay_ms.map(Duration::from_millis).unwrap_or(Duration::from_millis(5_000)),
        timeout: request.timeout_ms.map(Duration::from_millis).unwrap_or(Duration::from_secs(600)),
        project_id: request.project_id,
        metadata: HashMap::new(),
        last_run_at: None,
        last_successful_run_at: None,
        consecutive_failures: 0,
        running_attempt: None,
        running_since: None,
    };
    let job = state.cron.schedule_job(job).await?;
    Ok(Json(job))
}

pub async fn pause_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<CronJobId>,
) -> Result<StatusCode, ApiError> {
    state.cron.pause_job(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resume_job(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<CronJobId>,
) -> Result<StatusCode, ApiError> {
    state.cron.resume_job(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CircuitBreakerTriggerRequest {
    pub reason: String,
}

pub async fn trigger_circuit_breaker(
    Extension(state): Extension<AppState>,
    Json(request): Json<CircuitBreakerTriggerRequest>,
) -> StatusCode {
    state.admission.trigger_circuit_breaker(&request.reason);
    StatusCode::NO_CONTENT
}

pub async fn reset_circuit_breaker(Extension(state): Extension<AppState>) -> StatusCode {
    state.admission.reset_circuit_breaker();
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub circuit: crate::domain::CircuitState,
    pub global_concurrency_limit: usize,
    pub domain_throttle_entries: usize,
    pub project_throttle_entries: usize,
    pub checked_at: chrono::DateTime<Utc>,
}

pub async fn get_metrics(Extension(state): Extension<AppState>) -> Json<MetricsResponse> {
    let now = Utc::now();
    let (domain_throttle_entries, project_throttle_entries) = state.admission.throttle_counts();
    Json(MetricsResponse {
        circuit: state.admission.circuit_snapshot(now),
        global_concurrency_limit: state.admission.global_concurrency_limit(),
        domain_throttle_entries,
        project_throttle_entries,
        checked_at: now,
    })
}
