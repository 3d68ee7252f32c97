use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    AnalysisRecord, CronJob, JobExecution, Project, ProjectId, ProjectStatus, Snapshot, Target,
    TargetId,
};

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("not found")]
    NotFound,
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// The persistence collaborator (§6.1). All single-entity operations are
/// atomic; batch writes are the caller's responsibility to reconcile.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn find_project(&self, id: ProjectId) -> Result<Option<Project>, ObjectStoreError>;
    async fn list_projects(
        &self,
        status: Option<ProjectStatus>,
    ) -> Result<Vec<Project>, ObjectStoreError>;
    async fn update_project_status(
        &self,
        id: ProjectId,
        status: ProjectStatus,
    ) -> Result<(), ObjectStoreError>;
    async fn touch_project_analysis(&self, id: ProjectId) -> Result<(), ObjectStoreError>;

    async fn list_targets(&self, project_id: ProjectId) -> Result<Vec<Target>, ObjectStoreError>;
    async fn find_target_by_url(&self, url: &str) -> Result<Option<Target>, ObjectStoreError>;

    /// Persists a Snapshot and its metadata as one atomic write (§9 decision:
    /// metadata is embedded in the record, so there is no separate call that
    /// could leave one half written without the other).
    async fn create_snapshot(&self, snapshot: Snapshot) -> Result<Snapshot, ObjectStoreError>;
    async fn latest_snapshot_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Option<Snapshot>, ObjectStoreError>;
    async fn list_snapshots_by_target(
        &self,
        target_id: TargetId,
        limit: Option<usize>,
    ) -> Result<Vec<Snapshot>, ObjectStoreError>;
    async fn delete_snapshots_older_than(
        &self,
        target_id: TargetId,
        keep_n: usize,
    ) -> Result<u64, ObjectStoreError>;

    async fn upsert_cron_job(&self, job: CronJob) -> Result<CronJob, ObjectStoreError>;
    async fn list_active_cron_jobs(&self) -> Result<Vec<CronJob>, ObjectStoreError>;
    async fn set_cron_job_active(
        &self,
        id: crate::domain::CronJobId,
        active: bool,
    ) -> Result<(), ObjectStoreError>;
    async fn delete_cron_job(&self, id: crate::domain::CronJobId) -> Result<(), ObjectStoreError>;

    async fn append_job_execution(
        &self,
        execution: JobExecution,
    ) -> Result<JobExecution, ObjectStoreError>;
    async fn list_job_executions(
        &self,
        job_id: crate::domain::CronJobId,
        limit: Option<usize>,
    ) -> Result<Vec<JobExecution>, ObjectStoreError>;
    async fn trim_job_executions(
        &self,
        job_id: crate::domain::CronJobId,
        keep_n: usize,
    ) -> Result<u64, ObjectStoreError>;

    async fn create_analysis_record(
        &self,
        record: AnalysisRecord,
    ) -> Result<AnalysisRecord, ObjectStoreError>;
    async fn latest_analysis_by_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<AnalysisRecord>, ObjectStoreError>;

    async fn latest_snapshots_by_targets(
        &self,
        target_ids: &[TargetId],
        per_target: usize,
    ) -> Result<Vec<Snapshot>, ObjectStoreError> {
        let mut out = Vec::new();
        for &target_id in target_ids {
            let mut snaps = self
                .list_snapshots_by_target(target_id, Some(per_target))
                .await?;
            out.append(&mut snaps);
        }
        Ok(out)
    }
}
