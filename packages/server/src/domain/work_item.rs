use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::project::ProjectId;
use super::target::{TargetId, TargetKind};

/// Why a target needs scraping (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkItemReason {
    Stale,
    Missing,
    ManualTrigger,
    RetryAfterFailure,
}

/// Scheduler-assigned priority (§4.2: MISSING or age > `highPriorityAgeDays`
/// is HIGH, everything else is MEDIUM). Ordered so a priority-then-FIFO sort
/// (§3) puts HIGH items first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkItemPriority {
    Medium,
    High,
}

/// A transient unit of scheduling work (§3); never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct WorkItem {
    pub target_kind: TargetKind,
    pub project_id: ProjectId,
    pub target_id: TargetId,
    pub reason: WorkItemReason,
    #[builder(default = WorkItemPriority::Medium)]
    pub priority: WorkItemPriority,
    #[builder(setter(into))]
    pub url: String,
    #[builder(default = Uuid::new_v4())]
    pub correlation_id: Uuid,
}

impl WorkItem {
    pub fn manual(
        project_id: ProjectId,
        target_id: TargetId,
        target_kind: TargetKind,
        url: impl Into<String>,
    ) -> Self {
        Self::builder()
            .target_kind(target_kind)
            .project_id(project_id)
            .target_id(target_id)
            .reason(WorkItemReason::ManualTrigger)
            .priority(WorkItemPriority::High)
            .url(url)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_trigger_is_high_priority() {
        let item = WorkItem::manual(
            ProjectId::new(),
            TargetId::new(),
            TargetKind::Product,
            "https://example.com",
        );
        assert_eq!(item.priority, WorkItemPriority::High);
        assert_eq!(item.reason, WorkItemReason::ManualTrigger);
    }

    #[test]
    fn priority_orders_high_before_medium() {
        assert!(WorkItemPriority::High > WorkItemPriority::Medium);
    }
}
