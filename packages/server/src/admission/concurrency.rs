//! In-flight concurrency tracking (§4.1 step 6, §5 "tasks hold slots while
//! `fn` runs"). Global capacity is mutable at runtime so `HealthSupervisor`'s
//! REDUCE_LOAD remediation (§4.5) can lower it without restarting anything;
//! per-project capacity is fixed from config.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::domain::ProjectId;

pub struct ConcurrencyTracker {
    global_in_flight: AtomicUsize,
    global_limit: AtomicUsize,
    per_project_limit: usize,
    per_project_in_flight: RwLock<HashMap<ProjectId, Arc<AtomicUsize>>>,
}

/// Released automatically on drop so every exit path of
/// `executeWithRateLimit` — success, failure, panic unwind — restores the
/// pre-call concurrency counts (§8 testable property).
pub struct ConcurrencySlot<'a> {
    tracker: &'a ConcurrencyTracker,
    project_id: ProjectId,
}

impl Drop for ConcurrencySlot<'_> {
    fn drop(&mut self) {
        self.tracker.global_in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Some(counter) = self
            .tracker
            .per_project_in_flight
            .read()
            .unwrap()
            .get(&self.project_id)
        {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl ConcurrencyTracker {
    pub fn new(global_limit: usize, per_project_limit: usize) -> Self {
        Self {
            global_in_flight: AtomicUsize::new(0),
            global_limit: AtomicUsize::new(global_limit),
            per_project_limit,
            per_project_in_flight: RwLock::new(HashMap::new()),
        }
    }

    pub fn global_in_flight(&self) -> usize {
        self.global_in_flight.load(Ordering::SeqCst)
    }

    pub fn global_limit(&self) -> usize {
        self.global_limit.load(Ordering::SeqCst)
    }

    /// Applied by HealthSupervisor's REDUCE_LOAD action (§4.5).
    pub fn set_global_limit(&self, limit: usize) {
        self.global_limit.store(limit, Ordering::SeqCst);
    }

    fn project_counter(&self, project_id: ProjectId) -> Arc<AtomicUsize> {
        if let Some(counter) = self.per_project_in_flight.read().unwrap().get(&project_id) {
            return counter.clone();
        }
        self.per_project_in_flight
            .write()
            .unwrap()
            .entry(project_id)
            .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
            .clone()
    }

    pub fn project_in_flight(&self, project_id: ProjectId) -> usize {
        self.project_counter(project_id).load(Ordering::SeqCst)
    }

    /// Both global and per-project slots are required before execution
    /// (§4.1 `executeWithRateLimit`). Acquiring is all-or-nothing: a
    /// project-slot failure rolls back the global increment.
    pub fn try_acquire(&self, project_id: ProjectId) -> Option<ConcurrencySlot<'_>> {
        let limit = self.global_limit();
        let mut current = self.global_in_flight.load(Ordering::SeqCst);
        loop {
            if current >= limit {
                return None;
            }
            match self.global_in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        let project_counter = self.project_counter(project_id);
        let mut project_current = project_counter.load(Ordering::SeqCst);
        loop {
            if project_current >= self.per_project_limit {
                self.global_in_flight.fetch_sub(1, Ordering::SeqCst);
                return None;
            }
            match project_counter.compare_exchange_weak(
                project_current,
                project_current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => project_current = observed,
            }
        }

        Some(ConcurrencySlot {
            tracker: self,
            project_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_release_restores_counts() {
        let tracker = ConcurrencyTracker::new(2, 2);
        let project_id = ProjectId::new();
        {
            let _slot = tracker.try_acquire(project_id).unwrap();
            assert_eq!(tracker.global_in_flight(), 1);
            assert_eq!(tracker.project_in_flight(project_id), 1);
        }
        assert_eq!(tracker.global_in_flight(), 0);
        assert_eq!(tracker.project_in_flight(project_id), 0);
    }

    #[test]
    fn denies_beyond_global_limit() {
        let tracker = ConcurrencyTracker::new(1, 5);
        let project_id = ProjectId::new();
        let _slot = tracker.try_acquire(project_id).unwrap();
        assert!(tracker.try_acquire(ProjectId::new()).is_none());
    }

    #[test]
    fn reduce_load_lowers_effective_limit() {
        let tracker = ConcurrencyTracker::new(4, 4);
        tracker.set_global_limit(1);
        let project_id = ProjectId::new();
        let _slot = tracker.try_acquire(project_id).unwrap();
        assert!(tracker.try_acquire(project_id).is_none());
    }
}
