//! Entry point for the competitive intelligence pipeline server.

use std::sync::Arc;

use anyhow::{Context, Result};
use server_core::admission::AdmissionController;
use server_core::analysis::AnalysisOrchestrator;
use server_core::config::Config;
use server_core::cron::CronEngine;
use server_core::external::{ClaudeAnalysisBackend, FirecrawlScrapeDriver, PostgresObjectStore, SimpleScrapeDriver};
use server_core::freshness::FreshnessEvaluator;
use server_core::health::HealthSupervisor;
use server_core::httpapi::{build_router, AppState};
use server_core::scheduler::Scheduler;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting competitive intelligence pipeline");

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!("configuration loaded");

    tracing::info!("connecting to database...");
    let store = Arc::new(
        PostgresObjectStore::new(&config.database_url)
            .await
            .context("failed to connect to database")?,
    );
    tracing::info!("database connected, migrations complete");

    let driver: Arc<dyn server_core::external::ScrapeDriver> = match config.firecrawl_api_key.as_deref() {
        Some(api_key) => {
            tracing::info!("using FirecrawlScrapeDriver");
            Arc::new(FirecrawlScrapeDriver::new(api_key).context("failed to build firecrawl driver")?)
        }
        None => {
            tracing::info!("FIRECRAWL_API_KEY unset, falling back to SimpleScrapeDriver");
            Arc::new(SimpleScrapeDriver::new().context("failed to build simple scrape driver")?)
        }
    };

    let admission = Arc::new(AdmissionController::new(config.admission.clone()));
    let evaluator = Arc::new(FreshnessEvaluator::new(store.clone(), config.freshness.clone()));
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        driver,
        admission.clone(),
        evaluator.clone(),
        config.scheduler.clone(),
    ));
    let backend = Arc::new(ClaudeAnalysisBackend::new(config.anthropic_api_key.clone()));
    let analysis = Arc::new(AnalysisOrchestrator::new(
        store.clone(),
        scheduler.clone(),
        evaluator.clone(),
        backend,
        config.analysis.clone(),
    ));
    let cron = Arc::new(CronEngine::new(store.clone(), config.cron.clone()));
    let health = Arc::new(HealthSupervisor::new(
        store.clone(),
        admission.clone(),
        cron.clone(),
        evaluator.clone(),
        config.health.clone(),
    ));

    register_cron_handlers(&cron, store.clone(), scheduler.clone(), analysis.clone(), health.clone()).await;

    cron.recover_from_restart().await.context("crash recovery failed")?;
    let _ticker = cron.clone().start().await.context("failed to start cron tick wheel")?;
    tracing::info!("cron tick wheel started");

    let state = AppState {
        store,
        admission,
        cron,
        evaluator,
        scheduler,
        analysis,
        health,
    };
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, "binding management surface");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind to address")?;

    axum::serve(listener, app.into_make_service())
        .await
        .context("server error")?;

    Ok(())
}

/// Wires each `JobKind` to the component that actually performs the work
/// (§4.3): a `FreshnessSweep` drains every active project through the
/// scheduler, `PeriodicAnalysis`/`ScheduledReport` trigger the orchestrator,
/// and `SystemMaintenance` ticks the health supervisor.
async fn register_cron_handlers(
    cron: &Arc<CronEngine>,
    store: Arc<dyn server_core::external::ObjectStore>,
    scheduler: Arc<Scheduler>,
    analysis: Arc<AnalysisOrchestrator>,
    health: Arc<HealthSupervisor>,
) {
    use server_core::cron::JobFailure;
    use server_core::domain::JobKind;

    {
        let scheduler = scheduler.clone();
        let store = store.clone();
        cron.register_handler(JobKind::FreshnessSweep, move |job| {
            let scheduler = scheduler.clone();
            let store = store.clone();
            async move {
                // An unbound job (no project_id) sweeps every active project;
                // a bound one only checks its own.
                let project_ids = match job.project_id {
                    Some(id) => vec![id],
                    None => store
                        .list_projects(Some(server_core::domain::ProjectStatus::Active))
                        .await
                        .map_err(|e| JobFailure::transient(e.to_string()))?
                        .into_iter()
                        .map(|p| p.id)
                        .collect(),
                };

                let mut tasks_executed = 0usize;
                for project_id in project_ids {
                    let result = scheduler
                        .check_and_trigger(project_id)
                        .await
                        .map_err(|e| JobFailure::transient(e.to_string()))?;
                    tasks_executed += result.tasks_executed;
                }
                Ok(format!("{tasks_executed} task(s) executed"))
            }
        })
        .await;
    }

    {
        let analysis = analysis.clone();
        let handler = move |job: server_core::domain::CronJob| {
            let analysis = analysis.clone();
            async move {
                let project_id = job.project_id.ok_or_else(|| JobFailure::permanent("analysis job requires a project_id"))?;
                let options = server_core::analysis::TriggerOptions {
                    force_fresh_data: false,
                    analysis_type: server_core::domain::AnalysisType::Competitive,
                    priority: server_core::admission::Priority::Normal,
                    report_template: None,
                };
                let result = analysis.trigger_analysis(project_id, options).await;
                if result.success {
                    Ok(format!("analysis {:?} completed", result.analysis_id))
                } else {
                    Err(JobFailure::transient(result.error.unwrap_or_else(|| "analysis failed".to_string())))
                }
            }
        };
        cron.register_handler(JobKind::PeriodicAnalysis, handler.clone()).await;
        cron.register_handler(JobKind::ScheduledReport, handler).await;
    }

    {
        let health = health.clone();
        cron.register_handler(JobKind::SystemMaintenance, move |_job| {
            let health = health.clone();
            async move {
                let status = health.evaluate().await.map_err(|e| JobFailure::transient(e.to_string()))?;
                Ok(format!("health score {}", status.score))
            }
        })
        .await;
    }
}
