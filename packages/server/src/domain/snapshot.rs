use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use typed_builder::TypedBuilder;

use super::target::TargetId;
use crate::common::Id;

pub struct SnapshotMarker;
pub type SnapshotId = Id<SnapshotMarker>;

/// Immutable after write (§3). Snapshot and its metadata are persisted as a
/// single ObjectStore row so the pair can never exist partially (§9 open
/// question: persistence atomicity).
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct Snapshot {
    #[builder(default = SnapshotId::new())]
    pub id: SnapshotId,
    pub target_id: TargetId,
    #[builder(default = Utc::now())]
    pub captured_at: DateTime<Utc>,
    #[builder(setter(into))]
    pub html: String,
    #[builder(setter(into))]
    pub text: String,
    #[builder(default, setter(into))]
    pub title: String,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct SnapshotMetadata {
    pub status_code: u16,
    #[builder(default)]
    pub headers: HashMap<String, String>,
    pub scrape_duration_ms: u64,
    pub content_length: usize,
    #[builder(default)]
    pub retry_count: u32,
    #[builder(setter(into))]
    pub method: String,
}

impl Snapshot {
    /// Age of this snapshot in whole days, used by `FreshnessEvaluator`.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.captured_at).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn metadata() -> SnapshotMetadata {
        SnapshotMetadata::builder()
            .status_code(200)
            .scrape_duration_ms(120)
            .content_length(4096)
            .method("simple_scraper")
            .build()
    }

    #[test]
    fn age_days_rounds_down() {
        let now = Utc::now();
        let snapshot = Snapshot::builder()
            .target_id(TargetId::new())
            .captured_at(now - Duration::hours(36))
            .html("<html></html>")
            .text("hello")
            .metadata(metadata())
            .build();
        assert_eq!(snapshot.age_days(now), 1);
    }
}
