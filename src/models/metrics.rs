//! Counter snapshots, resource samples and the final run report

use crate::types::FailureKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Point-in-time copy of the aggregated send counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Every send attempt, successful or not
    pub packets_sent: u64,
    /// Bytes handed to the kernel by successful sends
    pub bytes_sent: u64,
    pub successes: u64,
    pub failures: u64,
    /// Sum of all recorded latencies in nanoseconds
    pub latency_sum_nanos: u64,
    /// Number of recorded latencies
    pub latency_count: u64,
    /// Largest recorded latency in nanoseconds
    pub latency_max_nanos: u64,
    /// Failures by kind
    pub failure_breakdown: BTreeMap<String, u64>,
}

impl StatsSnapshot {
    /// Mean send latency, zero when nothing was recorded
    pub fn average_latency(&self) -> Duration {
        if self.latency_count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.latency_sum_nanos / self.latency_count)
        }
    }

    pub fn max_latency(&self) -> Duration {
        Duration::from_nanos(self.latency_max_nanos)
    }

    /// Successful sends as a percentage of all attempts
    pub fn success_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.successes as f64 / self.packets_sent as f64 * 100.0
        }
    }

    /// Failures recorded for one kind
    pub fn failures_of(&self, kind: FailureKind) -> u64 {
        self.failure_breakdown.get(kind.as_str()).copied().unwrap_or(0)
    }
}

/// One host resource measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
    /// Host CPU utilization (0.0 to 100.0)
    pub cpu_percent: f32,
    /// Host memory utilization (0.0 to 100.0)
    pub memory_percent: f32,
}

impl ResourceSample {
    /// Create a sample stamped with the current time
    pub fn now(cpu_percent: f32, memory_percent: f32) -> Self {
        Self {
            timestamp: Utc::now(),
            cpu_percent: cpu_percent.clamp(0.0, 100.0),
            memory_percent: memory_percent.clamp(0.0, 100.0),
        }
    }
}

/// Immutable summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Target as "host:port"
    pub target: String,
    /// Resolved socket address the workers sent to
    pub resolved_target: String,
    pub packet_size: usize,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub successes: u64,
    pub failures: u64,
    /// Percentage of attempts that succeeded
    pub success_rate: f64,
    #[serde(with = "duration_micros")]
    pub avg_latency: Duration,
    #[serde(with = "duration_micros")]
    pub max_latency: Duration,
    #[serde(with = "duration_micros")]
    pub elapsed: Duration,
    pub packets_per_second: f64,
    pub configured_workers: usize,
    /// Workers still sending when the stop signal went out
    pub active_workers_at_end: usize,
    /// Workers that never got a socket
    pub failed_workers: usize,
    /// Workers aborted after the shutdown timeout
    pub abandoned_workers: usize,
    /// Set when the shutdown wait timed out
    pub force_stopped: bool,
    /// Set when the run was cancelled before its duration elapsed
    pub cancelled: bool,
    pub sampling_failures: u64,
    pub peak_cpu_percent: Option<f32>,
    pub peak_memory_percent: Option<f32>,
    /// Per-worker packets/sec ceiling in force at the end of the run
    pub final_rate_ceiling: u64,
    pub failure_breakdown: BTreeMap<String, u64>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    /// Megabytes sent (1 MB = 1024 * 1024 bytes)
    pub fn megabytes_sent(&self) -> f64 {
        self.bytes_sent as f64 / 1024.0 / 1024.0
    }

    /// Achieved throughput in megabits per second
    pub fn megabits_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            0.0
        } else {
            self.bytes_sent as f64 * 8.0 / 1_000_000.0 / secs
        }
    }
}

/// Serialize durations as integer microseconds
mod duration_micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_micros() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let micros = u64::deserialize(deserializer)?;
        Ok(Duration::from_micros(micros))
    }
}
