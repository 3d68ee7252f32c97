use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::project::ProjectId;
use super::snapshot::SnapshotId;
use crate::common::Id;

pub struct AnalysisRecordMarker;
pub type AnalysisRecordId = Id<AnalysisRecordMarker>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisType {
    Competitive,
    Trend,
    Comprehensive,
}

/// Quality bucket for a completed analysis (§4.4 `monitorProject`); also
/// the flag stored on the persisted record (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisQuality {
    High,
    Medium,
    Low,
    Failed,
}

/// Immutable after write; at most one successful record per (project,
/// logical invocation) (§3). `input_snapshot_ids` records exactly which
/// snapshots fed the completion, so `AnalysisOrchestrator` can assert the
/// "inputs captured at/after trigger time" property in §8.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct AnalysisRecord {
    #[builder(default = AnalysisRecordId::new())]
    pub id: AnalysisRecordId,
    pub project_id: ProjectId,
    pub analysis_type: AnalysisType,
    #[builder(default)]
    pub input_snapshot_ids: Vec<SnapshotId>,
    #[builder(setter(into))]
    pub content: String,
    pub quality: AnalysisQuality,
    #[builder(default)]
    pub attempt_count: u32,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_attempt_count_to_zero() {
        let record = AnalysisRecord::builder()
            .project_id(ProjectId::new())
            .analysis_type(AnalysisType::Competitive)
            .content("the competitor dropped prices 12% this week")
            .quality(AnalysisQuality::High)
            .build();
        assert_eq!(record.attempt_count, 0);
        assert!(record.input_snapshot_ids.is_empty());
    }
}
