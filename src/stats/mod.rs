//! Lock-free send statistics shared by all workers
//!
//! Every counter is an independent atomic. A [`StatsSnapshot`] reads them one
//! after another, so fields can be off by a send or two relative to each other
//! while workers are running; once every worker has exited the snapshot is
//! exact.

use crate::{models::StatsSnapshot, types::FailureKind};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Thread-safe aggregator for packets, bytes, outcomes and latency
#[derive(Debug, Default)]
pub struct StatsAggregator {
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    latency_sum_nanos: AtomicU64,
    latency_count: AtomicU64,
    latency_max_nanos: AtomicU64,
    failure_kinds: [AtomicU64; 5],
}

impl StatsAggregator {
    /// Create an aggregator with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one send attempt
    ///
    /// `bytes` is only added on success. Latency, when present, is folded into
    /// a running sum/count so memory stays constant for any run length.
    pub fn record_send(&self, success: bool, bytes: usize, latency: Option<Duration>) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);

        if success {
            self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(latency) = latency {
            let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
            self.latency_sum_nanos.fetch_add(nanos, Ordering::Relaxed);
            self.latency_count.fetch_add(1, Ordering::Relaxed);
            self.latency_max_nanos.fetch_max(nanos, Ordering::Relaxed);
        }
    }

    /// Record a failed send together with its classification
    pub fn record_failure(&self, kind: FailureKind, latency: Option<Duration>) {
        self.failure_kinds[kind.index()].fetch_add(1, Ordering::Relaxed);
        self.record_send(false, 0, latency);
    }

    /// Attempts so far; cheaper than a full snapshot
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        let failure_breakdown: BTreeMap<String, u64> = FailureKind::ALL
            .iter()
            .map(|kind| (kind.as_str().to_string(), self.failure_kinds[kind.index()].load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        // Outcome counters first, then the total, so a live snapshot never shows
        // more outcomes than attempts
        let successes = self.successes.load(Ordering::Acquire);
        let failures = self.failures.load(Ordering::Acquire);
        let packets_sent = self.packets_sent.load(Ordering::Acquire).max(successes + failures);

        StatsSnapshot {
            packets_sent,
            bytes_sent: self.bytes_sent.load(Ordering::Acquire),
            successes,
            failures,
            latency_sum_nanos: self.latency_sum_nanos.load(Ordering::Acquire),
            latency_count: self.latency_count.load(Ordering::Acquire),
            latency_max_nanos: self.latency_max_nanos.load(Ordering::Acquire),
            failure_breakdown,
        }
    }
}

#[cfg(test)]
mod comprehensive_tests;
