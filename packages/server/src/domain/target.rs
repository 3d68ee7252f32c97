use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::project::ProjectId;
use crate::common::Id;

pub struct TargetMarker;
pub type TargetId = Id<TargetMarker>;

/// A Product is our own tracked page; a Competitor is someone else's (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetKind {
    Product,
    Competitor,
}

#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct Target {
    #[builder(default = TargetId::new())]
    pub id: TargetId,
    pub project_id: ProjectId,
    pub kind: TargetKind,
    #[builder(setter(into))]
    pub display_name: String,
    #[builder(setter(into))]
    pub url: String,
}

impl Target {
    pub fn domain(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: TargetKind) -> Target {
        Target::builder()
            .project_id(ProjectId::new())
            .kind(kind)
            .display_name("Example")
            .url("https://example.com/page")
            .build()
    }

    #[test]
    fn domain_extracts_host() {
        let target = sample(TargetKind::Competitor);
        assert_eq!(target.domain().as_deref(), Some("example.com"));
    }

    #[test]
    fn domain_none_for_malformed_url() {
        let mut target = sample(TargetKind::Product);
        target.url = "not a url".to_string();
        assert_eq!(target.domain(), None);
    }
}
