use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Process-wide counters exposed on `/metrics` and `/metrics/prometheus`.
#[derive(Clone)]
pub struct Metrics {
    pub users_registered: Arc<AtomicU64>,
    pub logins: Arc<AtomicU64>,
    pub devices_provisioned: Arc<AtomicU64>,
    pub upstream_calls: Arc<AtomicU64>,
    pub upstream_failures: Arc<AtomicU64>,
    pub goals_matched: Arc<AtomicU64>,
    pub goals_missed: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            users_registered: Arc::new(AtomicU64::new(0)),
            logins: Arc::new(AtomicU64::new(0)),
            devices_provisioned: Arc::new(AtomicU64::new(0)),
            upstream_calls: Arc::new(AtomicU64::new(0)),
            upstream_failures: Arc::new(AtomicU64::new(0)),
            goals_matched: Arc::new(AtomicU64::new(0)),
            goals_missed: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_users_registered(&self) {
        self.users_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_logins(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_devices_provisioned(&self) {
        self.devices_provisioned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_upstream_calls(&self) {
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_upstream_failures(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_goal(&self, matched: bool) {
        if matched {
            self.goals_matched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.goals_missed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            users_registered: self.users_registered.load(Ordering::Relaxed),
            logins: self.logins.load(Ordering::Relaxed),
            devices_provisioned: self.devices_provisioned.load(Ordering::Relaxed),
            upstream_calls: self.upstream_calls.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            goals_matched: self.goals_matched.load(Ordering::Relaxed),
            goals_missed: self.goals_missed.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub users_registered: u64,
    pub logins: u64,
    pub devices_provisioned: u64,
    pub upstream_calls: u64,
    pub upstream_failures: u64,
    pub goals_matched: u64,
    pub goals_missed: u64,
    pub uptime_seconds: u64,
}
