//! Usage-counter and cost-gate state (§4.1 steps 2-3): hourly/daily request
//! counts and projected cost, with hour/day rollover.

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Timelike, Utc};

struct Inner {
    hour_bucket: u32,
    day_bucket: u32,
    hourly_count: u64,
    daily_count: u64,
    hourly_cost: f64,
    daily_cost: f64,
}

fn hour_bucket(now: DateTime<Utc>) -> u32 {
    // Hours since epoch, stable across a process lifetime, monotonic per
    // calendar hour — good enough as a rollover key without tracking wall
    // clock dates explicitly.
    (now.timestamp() / 3600) as u32
}

fn day_bucket(now: DateTime<Utc>) -> u32 {
    now.num_days_from_ce() as u32
}

pub struct UsageCounters {
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Copy)]
pub struct UsageSnapshot {
    pub hourly_count: u64,
    pub daily_count: u64,
    pub hourly_cost: f64,
    pub daily_cost: f64,
}

impl UsageCounters {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            inner: Mutex::new(Inner {
                hour_bucket: hour_bucket(now),
                day_bucket: day_bucket(now),
                hourly_count: 0,
                daily_count: 0,
                hourly_cost: 0.0,
                daily_cost: 0.0,
            }),
        }
    }

    fn roll(&self, inner: &mut Inner, now: DateTime<Utc>) {
        let current_hour = hour_bucket(now);
        let current_day = day_bucket(now);
        if current_hour != inner.hour_bucket {
            inner.hour_bucket = current_hour;
            inner.hourly_count = 0;
            inner.hourly_cost = 0.0;
        }
        if current_day != inner.day_bucket {
            inner.day_bucket = current_day;
            inner.daily_count = 0;
            inner.daily_cost = 0.0;
        }
        let _ = now.hour();
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> UsageSnapshot {
        let mut inner = self.inner.lock().unwrap();
        self.roll(&mut inner, now);
        UsageSnapshot {
            hourly_count: inner.hourly_count,
            daily_count: inner.daily_count,
            hourly_cost: inner.hourly_cost,
            daily_cost: inner.daily_cost,
        }
    }

    /// Projects what hourly/daily cost would be if `additional_cost` is
    /// admitted now, without recording it (§4.1 step 2).
    pub fn project_cost(&self, now: DateTime<Utc>, additional_cost: f64) -> (f64, f64) {
        let snapshot = self.snapshot(now);
        (
            snapshot.hourly_cost + additional_cost,
            snapshot.daily_cost + additional_cost,
        )
    }

    pub fn record_admission(&self, now: DateTime<Utc>, cost: f64) {
        let mut inner = self.inner.lock().unwrap();
        self.roll(&mut inner, now);
        inner.hourly_count += 1;
        inner.daily_count += 1;
        inner.hourly_cost += cost;
        inner.daily_cost += cost;
    }

    /// Milliseconds until the top of the next UTC hour, used for the
    /// hourly-limit `waitTimeMs` (§4.1 step 3).
    pub fn millis_until_next_hour(now: DateTime<Utc>) -> u64 {
        let elapsed_secs = now.minute() as i64 * 60 + now.second() as i64;
        ((3_600 - elapsed_secs) * 1_000).max(0) as u64
    }
}

impl Default for UsageCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_accumulates_within_window() {
        let counters = UsageCounters::new();
        let now = Utc::now();
        counters.record_admission(now, 0.1);
        counters.record_admission(now, 0.2);
        let snapshot = counters.snapshot(now);
        assert!((snapshot.hourly_cost - 0.3).abs() < 1e-9);
        assert_eq!(snapshot.hourly_count, 2);
    }

    #[test]
    fn project_cost_does_not_mutate_state() {
        let counters = UsageCounters::new();
        let now = Utc::now();
        counters.record_admission(now, 1.0);
        let (hourly, _) = counters.project_cost(now, 0.5);
        assert!((hourly - 1.5).abs() < 1e-9);
        assert!((counters.snapshot(now).hourly_cost - 1.0).abs() < 1e-9);
    }
}
