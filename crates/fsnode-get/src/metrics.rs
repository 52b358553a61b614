//! Retrieval counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct GetMetrics {
    /// Top-level requests received
    pub requests: AtomicU64,
    /// Fetches answered by the local shard
    pub local_hits: AtomicU64,
    /// Fetches answered by a remote node
    pub remote_hits: AtomicU64,
    /// Virtual objects assembled
    pub assemblies: AtomicU64,
    /// Requests that ended with `ObjectNotFound`
    pub not_found: AtomicU64,
}

/// Point-in-time copy of `GetMetrics`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GetMetricsSnapshot {
    pub requests: u64,
    pub local_hits: u64,
    pub remote_hits: u64,
    pub assemblies: u64,
    pub not_found: u64,
}

impl GetMetrics {
    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> GetMetricsSnapshot {
        GetMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            local_hits: self.local_hits.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            assemblies: self.assemblies.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
        }
    }
}
