//! Per-key (domain or project) throttle gate (§4.1 steps 4-5).

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::ThrottleEntry;

#[derive(Default)]
pub struct ThrottleMap {
    entries: RwLock<HashMap<String, ThrottleEntry>>,
}

impl ThrottleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(wait_time_ms)` if `key` is still within its throttle
    /// window, `None` if it is allowed right now.
    pub fn check(&self, key: &str, now: DateTime<Utc>) -> Option<u64> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(key)?;
        let next = entry.next_allowed_time?;
        if now < next {
            Some((next - now).num_milliseconds().max(0) as u64)
        } else {
            None
        }
    }

    /// Records an admit for `key`, arming the next-allowed-time `spacing`
    /// from now (§4.1 `executeWithRateLimit`, "updates ... throttle entries").
    pub fn record(&self, key: &str, now: DateTime<Utc>, spacing: Duration) {
        let spacing = chrono::Duration::from_std(spacing).unwrap_or_else(|_| chrono::Duration::zero());
        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| ThrottleEntry::builder().key(key).build());
        entry.last_request_time = Some(now);
        entry.next_allowed_time = Some(now + spacing);
        entry.request_count += 1;
        entry.throttled = false;
    }

    pub fn mark_throttled(&self, key: &str) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.throttled = true;
        }
    }

    /// Drops entries whose throttle window closed more than `ttl` ago
    /// (§4.1 "periodic cleanup of expired throttle entries").
    pub fn evict_expired(&self, now: DateTime<Utc>, ttl: Duration) {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        let mut entries = self.entries.write().unwrap();
        entries.retain(|_, entry| {
            entry
                .next_allowed_time
                .map(|next| now - next < ttl)
                .unwrap_or(true)
        });
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_admit_within_spacing_is_denied() {
        let throttle = ThrottleMap::new();
        let now = Utc::now();
        assert!(throttle.check("example.com", now).is_none());
        throttle.record("example.com", now, Duration::from_millis(10_000));

        let wait = throttle.check("example.com", now);
        assert!(wait.is_some());
        assert!(wait.unwrap() > 0);
    }

    #[test]
    fn allowed_again_after_spacing_elapses() {
        let throttle = ThrottleMap::new();
        let now = Utc::now();
        throttle.record("example.com", now, Duration::from_millis(1_000));
        let later = now + chrono::Duration::milliseconds(1_001);
        assert!(throttle.check("example.com", later).is_none());
    }
}
