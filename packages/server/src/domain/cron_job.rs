use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::project::ProjectId;
use crate::common::Id;

pub struct CronJobMarker;
pub type CronJobId = Id<CronJobMarker>;

pub struct JobExecutionMarker;
pub type JobExecutionId = Id<JobExecutionMarker, crate::common::V4>;

/// The four job kinds named in §3. `FreshnessSweep` runs the evaluator
/// across every active project; `PeriodicAnalysis` and `ScheduledReport`
/// drive `AnalysisOrchestrator`; `SystemMaintenance` is HealthSupervisor's
/// own housekeeping tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    ScheduledReport,
    PeriodicAnalysis,
    SystemMaintenance,
    FreshnessSweep,
}

/// One attempt (initial or retry) of a `CronJob` invocation (§3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobExecutionStatus {
    Running,
    Success,
    Failed,
    Timeout,
    Retry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Timeout,
    Transient,
    Permanent,
}

/// A named job bound to a cron expression (§3). `project_id` is optional:
/// an unbound job (e.g. a global freshness sweep) always runs; a bound
/// job's effective active flag is `active AND project.status == ACTIVE`
/// (§3 lifecycle rule), enforced by `CronEngine::is_effectively_active`.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct CronJob {
    #[builder(default = CronJobId::new())]
    pub id: CronJobId,
    #[builder(setter(into))]
    pub name: String,
    pub kind: JobKind,
    #[builder(setter(into))]
    pub cron_expression: String,
    #[builder(default = true)]
    pub active: bool,
    #[builder(default = 3)]
    pub max_retries: u32,
    #[builder(default = Duration::from_millis(5_000))]
    pub base_retry_delay: Duration,
    #[builder(default = Duration::from_secs(600))]
    pub timeout: Duration,
    #[builder(default, setter(strip_option))]
    pub project_id: Option<ProjectId>,
    #[builder(default)]
    pub metadata: HashMap<String, String>,
    #[builder(default, setter(strip_option))]
    pub last_run_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub last_successful_run_at: Option<DateTime<Utc>>,
    #[builder(default)]
    pub consecutive_failures: u32,
    /// Attempt number currently in flight, if any. Set just before a handler
    /// is invoked and cleared once its terminal `JobExecution` is persisted;
    /// a non-`None` value found at startup means the process died mid-handler
    /// (`CronEngine::recover_from_restart`).
    #[builder(default, setter(strip_option))]
    pub running_attempt: Option<u32>,
    #[builder(default, setter(strip_option))]
    pub running_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct JobExecution {
    #[builder(default = JobExecutionId::new())]
    pub id: JobExecutionId,
    pub job_id: CronJobId,
    #[builder(default = 1)]
    pub attempt: u32,
    #[builder(default = Utc::now())]
    pub started_at: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: JobExecutionStatus,
    #[builder(default, setter(strip_option))]
    pub error_kind: Option<ErrorKind>,
    #[builder(default, setter(into, strip_option))]
    pub error_message: Option<String>,
    #[builder(default, setter(into, strip_option))]
    pub output: Option<String>,
}

impl JobExecution {
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_none_while_running() {
        let execution = JobExecution::builder()
            .job_id(CronJobId::new())
            .status(JobExecutionStatus::Running)
            .build();
        assert!(execution.duration().is_none());
    }

    #[test]
    fn default_job_kind_fields() {
        let job = CronJob::builder()
            .name("nightly-freshness-sweep")
            .kind(JobKind::FreshnessSweep)
            .cron_expression("0 0 3 * * *")
            .build();
        assert!(job.active);
        assert_eq!(job.max_retries, 3);
        assert!(job.project_id.is_none());
    }
}
