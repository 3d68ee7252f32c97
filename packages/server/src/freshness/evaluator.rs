//! FreshnessEvaluator (§4.2): classifies each target as FRESH/STALE/MISSING
//! from its latest snapshot age, rolls that up into an overall project
//! status, and emits prioritized `WorkItem`s for anything that needs
//! re-scraping.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::FreshnessConfig;
use crate::domain::{ProjectId, Target, TargetId, TargetKind, WorkItem, WorkItemPriority, WorkItemReason};
use crate::external::object_store::{ObjectStore, ObjectStoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetFreshnessStatus {
    Fresh,
    Stale,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectFreshnessStatus {
    Fresh,
    Stale,
    MissingData,
    Mixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFreshness {
    pub target_id: TargetId,
    pub kind: TargetKind,
    pub url: String,
    pub status: TargetFreshnessStatus,
    pub age_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFreshness {
    pub project_id: ProjectId,
    pub status: ProjectFreshnessStatus,
    pub targets: Vec<TargetFreshness>,
    pub recommended_actions: Vec<String>,
}

pub struct FreshnessEvaluator {
    store: Arc<dyn ObjectStore>,
    config: FreshnessConfig,
}

impl FreshnessEvaluator {
    pub fn new(store: Arc<dyn ObjectStore>, config: FreshnessConfig) -> Self {
        Self { store, config }
    }

    fn classify_target(&self, age_days: Option<i64>) -> TargetFreshnessStatus {
        match age_days {
            None => TargetFreshnessStatus::Missing,
            Some(age) if age <= self.config.freshness_threshold_days => TargetFreshnessStatus::Fresh,
            Some(_) => TargetFreshnessStatus::Stale,
        }
    }

    async fn target_freshness(&self, now: DateTime<Utc>, target: &Target) -> Result<TargetFreshness, ObjectStoreError> {
        let latest = self.store.latest_snapshot_by_target(target.id).await?;
        let age_days = latest.map(|snapshot| snapshot.age_days(now));
        let status = self.classify_target(age_days);
        Ok(TargetFreshness {
            target_id: target.id,
            kind: target.kind,
            url: target.url.clone(),
            status,
            age_days,
        })
    }

    /// §4.2 `freshnessStatus`.
    pub async fn freshness_status(&self, project_id: ProjectId) -> Result<ProjectFreshness, ObjectStoreError> {
        let now = Utc::now();
        let targets = self.store.list_targets(project_id).await?;
        let mut target_freshness = Vec::with_capacity(targets.len());
        for target in &targets {
            target_freshness.push(self.target_freshness(now, target).await?);
        }

        let status = overall_status(&target_freshness);
        let recommended_actions = recommend_actions(status, &target_freshness);

        Ok(ProjectFreshness {
            project_id,
            status,
            targets: target_freshness,
            recommended_actions,
        })
    }

    /// §4.2 `workItems`: only targets needing scraping, MISSING or
    /// age > `highPriorityAgeDays` promoted to HIGH priority.
    pub async fn work_items(&self, project_id: ProjectId) -> Result<Vec<WorkItem>, ObjectStoreError> {
        let freshness = self.freshness_status(project_id).await?;
        let items = freshness
            .targets
            .into_iter()
            .filter(|t| t.status != TargetFreshnessStatus::Fresh)
            .map(|t| {
                let reason = match t.status {
                    TargetFreshnessStatus::Missing => WorkItemReason::Missing,
                    _ => WorkItemReason::Stale,
                };
                let priority = if t.status == TargetFreshnessStatus::Missing
                    || t.age_days.map(|age| age > self.config.high_priority_age_days).unwrap_or(false)
                {
                    WorkItemPriority::High
                } else {
                    WorkItemPriority::Medium
                };
                WorkItem::builder()
                    .target_kind(t.kind)
                    .project_id(project_id)
                    .target_id(t.target_id)
                    .reason(reason)
                    .priority(priority)
                    .url(t.url)
                    .build()
            })
            .collect();
        Ok(items)
    }
}

fn overall_status(targets: &[TargetFreshness]) -> ProjectFreshnessStatus {
    if targets.is_empty() {
        return ProjectFreshnessStatus::MissingData;
    }
    let total = targets.len();
    let missing = targets.iter().filter(|t| t.status == TargetFreshnessStatus::Missing).count();
    let stale = targets.iter().filter(|t| t.status == TargetFreshnessStatus::Stale).count();

    if missing == total {
        ProjectFreshnessStatus::MissingData
    } else if missing > 0 {
        ProjectFreshnessStatus::Mixed
    } else if stale == total {
        ProjectFreshnessStatus::Stale
    } else if stale > 0 {
        ProjectFreshnessStatus::Mixed
    } else {
        ProjectFreshnessStatus::Fresh
    }
}

fn recommend_actions(status: ProjectFreshnessStatus, targets: &[TargetFreshness]) -> Vec<String> {
    match status {
        ProjectFreshnessStatus::Fresh => Vec::new(),
        ProjectFreshnessStatus::Stale => vec!["re-scrape all targets".to_string()],
        ProjectFreshnessStatus::MissingData => vec!["scrape missing targets before first analysis".to_string()],
        ProjectFreshnessStatus::Mixed => {
            let missing = targets.iter().filter(|t| t.status == TargetFreshnessStatus::Missing).count();
            let stale = targets.iter().filter(|t| t.status == TargetFreshnessStatus::Stale).count();
            let mut actions = Vec::new();
            if missing > 0 {
                actions.push(format!("scrape {missing} missing target(s)"));
            }
            if stale > 0 {
                actions.push(format!("re-scrape {stale} stale target(s)"));
            }
            actions
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Snapshot, SnapshotMetadata};
    use crate::external::in_memory_store::InMemoryObjectStore;

    fn metadata() -> SnapshotMetadata {
        SnapshotMetadata::builder()
            .status_code(200)
            .scrape_duration_ms(10)
            .content_length(500)
            .method("simple_scraper")
            .build()
    }

    fn target(project_id: ProjectId, kind: TargetKind) -> Target {
        Target::builder()
            .project_id(project_id)
            .kind(kind)
            .display_name("t")
            .url("https://example.com")
            .build()
    }

    #[tokio::test]
    async fn missing_target_yields_missing_data_status() {
        let store = Arc::new(InMemoryObjectStore::new());
        let project_id = ProjectId::new();
        store.seed_target(target(project_id, TargetKind::Product));

        let evaluator = FreshnessEvaluator::new(store, FreshnessConfig::default());
        let freshness = evaluator.freshness_status(project_id).await.unwrap();
        assert_eq!(freshness.status, ProjectFreshnessStatus::MissingData);

        let items = evaluator.work_items(project_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].priority, WorkItemPriority::High);
        assert_eq!(items[0].reason, WorkItemReason::Missing);
    }

    #[tokio::test]
    async fn fresh_snapshot_yields_no_work_items() {
        let store = Arc::new(InMemoryObjectStore::new());
        let project_id = ProjectId::new();
        let product = target(project_id, TargetKind::Product);
        store.seed_target(product.clone());
        store
            .create_snapshot(
                Snapshot::builder()
                    .target_id(product.id)
                    .html("<html></html>")
                    .text("hello")
                    .metadata(metadata())
                    .build(),
            )
            .await
            .unwrap();

        let evaluator = FreshnessEvaluator::new(store, FreshnessConfig::default());
        let freshness = evaluator.freshness_status(project_id).await.unwrap();
        assert_eq!(freshness.status, ProjectFreshnessStatus::Fresh);
        assert!(evaluator.work_items(project_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn very_stale_snapshot_is_high_priority() {
        let store = Arc::new(InMemoryObjectStore::new());
        let project_id = ProjectId::new();
        let product = target(project_id, TargetKind::Product);
        store.seed_target(product.clone());
        store
            .create_snapshot(
                Snapshot::builder()
                    .target_id(product.id)
                    .captured_at(Utc::now() - chrono::Duration::days(20))
                    .html("<html></html>")
                    .text("hello")
                    .metadata(metadata())
                    .build(),
            )
            .await
            .unwrap();

        let evaluator = FreshnessEvaluator::new(store, FreshnessConfig::default());
        let items = evaluator.work_items(project_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].priority, WorkItemPriority::High);
        assert_eq!(items[0].reason, WorkItemReason::Stale);
    }
}
