use axum::extract::Extension;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    get_health, get_metrics, get_project_freshness, list_jobs, pause_job, reset_circuit_breaker, resume_job,
    schedule_job, trigger_analysis, trigger_circuit_breaker, trigger_scraping,
};
use super::state::AppState;

/// Builds the management-surface router (§6.4), layered the way the
/// teacher's `build_app` layers its own: `Extension<State>` for handler
/// access, `TraceLayer` for request logging, `CorsLayer` open for an
/// internal operations surface.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .route("/projects/:project_id/freshness", get(get_project_freshness))
        .route("/projects/:project_id/scrape", post(trigger_scraping))
        .route("/projects/:project_id/analysis", post(trigger_analysis))
        .route("/jobs", get(list_jobs).post(schedule_job))
        .route("/jobs/:job_id/pause", post(pause_job))
        .route("/jobs/:job_id/resume", post(resume_job))
        .route("/admission/circuit-breaker/trigger", post(trigger_circuit_breaker))
        .route("/admission/circuit-breaker/reset", post(reset_circuit_breaker))
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
