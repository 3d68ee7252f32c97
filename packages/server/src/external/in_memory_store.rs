use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::object_store::{ObjectStore, ObjectStoreError};
use crate::domain::{
    AnalysisRecord, CronJob, CronJobId, JobExecution, Project, ProjectId, ProjectStatus, Snapshot,
    Target, TargetId,
};

/// An in-memory `ObjectStore`, the test double used throughout the
/// component test suites, following the same shape as the teacher's
/// `TestJobManager`.
#[derive(Default)]
pub struct InMemoryObjectStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
    targets: RwLock<HashMap<TargetId, Target>>,
    snapshots: RwLock<HashMap<TargetId, Vec<Snapshot>>>,
    cron_jobs: RwLock<HashMap<CronJobId, CronJob>>,
    job_executions: RwLock<HashMap<CronJobId, Vec<JobExecution>>>,
    analysis_records: RwLock<HashMap<ProjectId, Vec<AnalysisRecord>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_project(&self, project: Project) {
        self.projects.write().unwrap().insert(project.id, project);
    }

    pub fn seed_target(&self, target: Target) {
        self.targets.write().unwrap().insert(target.id, target);
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn find_project(&self, id: ProjectId) -> Result<Option<Project>, ObjectStoreError> {
        Ok(self.projects.read().unwrap().get(&id).cloned())
    }

    async fn list_projects(
        &self,
        status: Option<ProjectStatus>,
    ) -> Result<Vec<Project>, ObjectStoreError> {
        let projects = self.projects.read().unwrap();
        Ok(projects
            .values()
            .filter(|p| status.map(|s| p.status == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn update_project_status(
        &self,
        id: ProjectId,
        status: ProjectStatus,
    ) -> Result<(), ObjectStoreError> {
        let mut projects = self.projects.write().unwrap();
        let project = projects.get_mut(&id).ok_or(ObjectStoreError::NotFound)?;
        project.status = status;
        Ok(())
    }

    async fn touch_project_analysis(&self, id: ProjectId) -> Result<(), ObjectStoreError> {
        let mut projects = self.projects.write().unwrap();
        let project = projects.get_mut(&id).ok_or(ObjectStoreError::NotFound)?;
        project.last_analysis_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn list_targets(&self, project_id: ProjectId) -> Result<Vec<Target>, ObjectStoreError> {
        Ok(self
            .targets
            .read()
            .unwrap()
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn find_target_by_url(&self, url: &str) -> Result<Option<Target>, ObjectStoreError> {
        Ok(self
            .targets
            .read()
            .unwrap()
            .values()
            .find(|t| t.url == url)
            .cloned())
    }

    async fn create_snapshot(&self, snapshot: Snapshot) -> Result<Snapshot, ObjectStoreError> {
        let mut snapshots = self.snapshots.write().unwrap();
        snapshots
            .entry(snapshot.target_id)
            .or_default()
            .push(snapshot.clone());
        Ok(snapshot)
    }

    async fn latest_snapshot_by_target(
        &self,
        target_id: TargetId,
    ) -> Result<Option<Snapshot>, ObjectStoreError> {
        Ok(self
            .snapshots
            .read()
            .unwrap()
            .get(&target_id)
            .and_then(|snaps| snaps.iter().max_by_key(|s| s.captured_at).cloned()))
    }

    async fn list_snapshots_by_target(
        &self,
        target_id: TargetId,
        limit: Option<usize>,
    ) -> Result<Vec<Snapshot>, ObjectStoreError> {
        let snapshots = self.snapshots.read().unwrap();
        let mut snaps = snapshots.get(&target_id).cloned().unwrap_or_default();
        snaps.sort_by_key(|s| std::cmp::Reverse(s.captured_at));
        if let Some(limit) = limit {
            snaps.truncate(limit);
        }
        Ok(snaps)
    }

    async fn delete_snapshots_older_than(
        &self,
        target_id: TargetId,
        keep_n: usize,
    ) -> Result<u64, ObjectStoreError> {
        let mut snapshots = self.snapshots.write().unwrap();
        if let Some(snaps) = snapshots.get_mut(&target_id) {
            snaps.sort_by_key(|s| std::cmp::Reverse(s.captured_at));
            if snaps.len() > keep_n {
                let removed = snaps.len() - keep_n;
                snaps.truncate(keep_n);
                return Ok(removed as u64);
            }
        }
        Ok(0)
    }

    async fn upsert_cron_job(&self, job: CronJob) -> Result<CronJob, ObjectStoreError> {
        self.cron_jobs.write().unwrap().insert(job.id, job.clone());
        Ok(job)
    }

    async fn list_active_cron_jobs(&self) -> Result<Vec<CronJob>, ObjectStoreError> {
        Ok(self.cron_jobs.read().unwrap().values().cloned().collect())
    }

    async fn set_cron_job_active(
        &self,
        id: CronJobId,
        active: bool,
    ) -> Result<(), ObjectStoreError> {
        let mut jobs = self.cron_jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or(ObjectStoreError::NotFound)?;
        job.active = active;
        Ok(())
    }

    async fn delete_cron_job(&self, id: CronJobId) -> Result<(), ObjectStoreError> {
        self.cron_jobs.write().unwrap().remove(&id);
        Ok(())
    }

    async fn append_job_execution(
        &self,
        execution: JobExecution,
    ) -> Result<JobExecution, ObjectStoreError> {
        self.job_executions
            .write()
            .unwrap()
            .entry(execution.job_id)
            .or_default()
            .push(execution.clone());
        Ok(execution)
    }

    async fn list_job_executions(
        &self,
        job_id: CronJobId,
        limit: Option<usize>,
    ) -> Result<Vec<JobExecution>, ObjectStoreError> {
        let executions = self.job_executions.read().unwrap();
        let mut list = executions.get(&job_id).cloned().unwrap_or_default();
        list.sort_by_key(|e| std::cmp::Reverse(e.started_at));
        if let Some(limit) = limit {
            list.truncate(limit);
        }
        Ok(list)
    }

    async fn trim_job_executions(
        &self,
        job_id: CronJobId,
        keep_n: usize,
    ) -> Result<u64, ObjectStoreError> {
        let mut executions = self.job_executions.write().unwrap();
        if let Some(list) = executions.get_mut(&job_id) {
            list.sort_by_key(|e| std::cmp::Reverse(e.started_at));
            if list.len() > keep_n {
                let removed = list.len() - keep_n;
                list.truncate(keep_n);
                return Ok(removed as u64);
            }
        }
        Ok(0)
    }

    async fn create_analysis_record(
        &self,
        record: AnalysisRecord,
    ) -> Result<AnalysisRecord, ObjectStoreError> {
        self.analysis_records
            .write()
            .unwrap()
            .entry(record.project_id)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn latest_analysis_by_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<AnalysisRecord>, ObjectStoreError> {
        Ok(self
            .analysis_records
            .read()
            .unwrap()
            .get(&project_id)
            .and_then(|recs| recs.iter().max_by_key(|r| r.created_at).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SnapshotMetadata, TargetKind};

    #[tokio::test]
    async fn snapshot_roundtrip_keeps_latest() {
        let store = InMemoryObjectStore::new();
        let target = Target::builder()
            .project_id(ProjectId::new())
            .kind(TargetKind::Product)
            .display_name("Acme")
            .url("https://acme.test")
            .build();
        store.seed_target(target.clone());

        let metadata = SnapshotMetadata::builder()
            .status_code(200)
            .scrape_duration_ms(10)
            .content_length(500)
            .method("simple_scraper")
            .build();
        let first = Snapshot::builder()
            .target_id(target.id)
            .html("<html>one</html>")
            .text("one")
            .metadata(metadata.clone())
            .build();
        store.create_snapshot(first).await.unwrap();

        let second = Snapshot::builder()
            .target_id(target.id)
            .html("<html>two</html>")
            .text("two")
            .metadata(metadata)
            .build();
        let second_id = second.id;
        store.create_snapshot(second).await.unwrap();

        let latest = store
            .latest_snapshot_by_target(target.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second_id);
    }

    #[tokio::test]
    async fn job_execution_retention_trims_oldest() {
        let store = InMemoryObjectStore::new();
        let job_id = CronJobId::new();
        for _ in 0..5 {
            let execution = JobExecution::builder()
                .job_id(job_id)
                .status(crate::domain::JobExecutionStatus::Success)
                .build();
            store.append_job_execution(execution).await.unwrap();
        }
        store.trim_job_executions(job_id, 2).await.unwrap();
        let remaining = store.list_job_executions(job_id, None).await.unwrap();
        assert_eq!(remaining.len(), 2);
    }
}
