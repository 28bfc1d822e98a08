//! Commit-path counters
//!
//! Counters only, monotonic, reset on process start. Relaxed ordering:
//! values are read for reporting, never for synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for the replication commit path
#[derive(Debug, Default)]
pub struct CommitMetrics {
    registrations: AtomicU64,
    bypassed: AtomicU64,
    waits: AtomicU64,
    commits: AtomicU64,
    local_commit_failures: AtomicU64,
    certification_aborts: AtomicU64,
    size_limit_aborts: AtomicU64,
    bytes_streamed: AtomicU64,
    missing_keys: AtomicU64,
}

/// Point-in-time copy of [`CommitMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub registrations: u64,
    pub bypassed: u64,
    pub waits: u64,
    pub commits: u64,
    pub local_commit_failures: u64,
    pub certification_aborts: u64,
    pub size_limit_aborts: u64,
    pub bytes_streamed: u64,
    pub missing_keys: u64,
}

impl CommitMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_registrations(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_bypassed(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts waits that actually had a prior commit to wait for.
    pub fn increment_waits(&self) {
        self.waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_local_commit_failures(&self) {
        self.local_commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_certification_aborts(&self) {
        self.certification_aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_size_limit_aborts(&self) {
        self.size_limit_aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_streamed(&self, bytes: u64) {
        self.bytes_streamed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_missing_keys(&self, count: u64) {
        self.missing_keys.fetch_add(count, Ordering::Relaxed);
    }

    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            registrations: self.registrations.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            local_commit_failures: self.local_commit_failures.load(Ordering::Relaxed),
            certification_aborts: self.certification_aborts.load(Ordering::Relaxed),
            size_limit_aborts: self.size_limit_aborts.load(Ordering::Relaxed),
            bytes_streamed: self.bytes_streamed.load(Ordering::Relaxed),
            missing_keys: self.missing_keys.load(Ordering::Relaxed),
        }
    }
}
