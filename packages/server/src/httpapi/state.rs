use std::sync::Arc;

use crate::admission::AdmissionController;
use crate::analysis::AnalysisOrchestrator;
use crate::cron::CronEngine;
use crate::external::object_store::ObjectStore;
use crate::freshness::FreshnessEvaluator;
use crate::health::HealthSupervisor;
use crate::scheduler::Scheduler;

/// The management-surface dependencies (§6.4), shared across handlers via
/// `Extension`. Every field is already an `Arc`, so cloning `AppState` is
/// cheap and each handler only borrows what it needs.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub admission: Arc<AdmissionController>,
    pub cron: Arc<CronEngine>,
    pub evaluator: Arc<FreshnessEvaluator>,
    pub scheduler: Arc<Scheduler>,
    pub analysis: Arc<AnalysisOrchestrator>,
    pub health: Arc<HealthSupervisor>,
}
