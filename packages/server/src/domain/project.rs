use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::common::Id;

pub struct ProjectMarker;
pub type ProjectId = Id<ProjectMarker>;

/// Status transitions are monotonic in operational lifetime except via admin reset (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct Project {
    #[builder(default = ProjectId::new())]
    pub id: ProjectId,
    #[builder(setter(into))]
    pub name: String,
    #[builder(default = ProjectStatus::Active)]
    pub status: ProjectStatus,
    #[builder(default = ProjectPriority::Normal)]
    pub priority: ProjectPriority,
    #[builder(default, setter(strip_option))]
    pub last_analysis_at: Option<DateTime<Utc>>,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// A project can only be analysed once it has at least one product and
    /// one competitor (§3: "otherwise analysis is not eligible").
    pub fn analysis_eligible(&self, product_count: usize, competitor_count: usize) -> bool {
        product_count > 0 && competitor_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_eligible_requires_both_sides() {
        let project = Project::builder().name("Acme").build();
        assert!(!project.analysis_eligible(0, 2));
        assert!(!project.analysis_eligible(1, 0));
        assert!(project.analysis_eligible(1, 1));
    }

    #[test]
    fn priority_ordering() {
        assert!(ProjectPriority::Low < ProjectPriority::Normal);
        assert!(ProjectPriority::Normal < ProjectPriority::High);
    }
}
