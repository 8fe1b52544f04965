//! Load-adaptive send-rate ceiling
//!
//! The ceiling is a per-worker packets/sec limit recomputed from each resource
//! sample with a stepped multiplicative policy: halve above a high threshold,
//! grow by a quarter below both low-water marks, hold in between. Workers read
//! it through an atomic and pace themselves with [`SlicePacer`].

use crate::{
    logging::EngineLogger,
    models::ResourceSample,
    monitor::SampleObserver,
    types::LoadLevel,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Thresholds and factors for the rate ceiling
#[derive(Debug, Clone, PartialEq)]
pub struct RatePolicy {
    /// CPU percentage at or above which workers back off
    pub high_cpu: f32,
    /// Memory percentage at or above which workers back off
    pub high_memory: f32,
    /// CPU percentage below which workers may ramp up
    pub low_water_cpu: f32,
    /// Memory percentage below which workers may ramp up
    pub low_water_memory: f32,
    /// Multiplier applied under high load
    pub backoff_factor: f64,
    /// Multiplier applied under low load
    pub ramp_factor: f64,
    /// Lowest ceiling in packets/sec per worker
    pub floor: u64,
    /// Highest ceiling in packets/sec per worker before the bandwidth bound
    pub default_max: u64,
    /// Aggregate bytes/sec all workers together must stay under
    pub aggregate_bytes_per_sec: u64,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            high_cpu: 90.0,
            high_memory: 90.0,
            low_water_cpu: 70.0,
            low_water_memory: 75.0,
            backoff_factor: 0.5,
            ramp_factor: 1.25,
            floor: 10,
            default_max: 50_000,
            aggregate_bytes_per_sec: 125_000_000,
        }
    }
}

impl RatePolicy {
    /// Per-worker maximum for a pool of `workers` sending `packet_size` bytes
    pub fn max_rate(&self, workers: usize, packet_size: usize) -> u64 {
        let per_packet = (workers.max(1) as u64).saturating_mul(packet_size.max(1) as u64);
        let bandwidth_bound = self.aggregate_bytes_per_sec / per_packet;
        self.default_max.min(bandwidth_bound).max(self.floor)
    }

    pub fn load_level(&self, sample: &ResourceSample) -> LoadLevel {
        if sample.cpu_percent >= self.high_cpu || sample.memory_percent >= self.high_memory {
            LoadLevel::High
        } else if sample.cpu_percent < self.low_water_cpu && sample.memory_percent < self.low_water_memory {
            LoadLevel::Low
        } else {
            LoadLevel::Moderate
        }
    }

    /// Next ceiling given the current one, a sample and the per-worker maximum
    pub fn next_ceiling(&self, current: u64, sample: &ResourceSample, max: u64) -> u64 {
        let next = match self.load_level(sample) {
            LoadLevel::High => (current as f64 * self.backoff_factor) as u64,
            LoadLevel::Low => ((current as f64 * self.ramp_factor) as u64).max(current.saturating_add(1)),
            LoadLevel::Moderate => current,
        };
        next.clamp(self.floor.min(max), max)
    }
}

/// Shared ceiling read by every worker and updated on each monitor tick
pub struct RateController {
    policy: RatePolicy,
    max_rate: u64,
    ceiling: AtomicU64,
    logger: EngineLogger,
}

impl RateController {
    /// Create a controller for the given pool shape; the ceiling starts at the maximum
    pub fn new(policy: RatePolicy, workers: usize, packet_size: usize, logger: EngineLogger) -> Self {
        let max_rate = policy.max_rate(workers, packet_size);
        Self {
            policy,
            max_rate,
            ceiling: AtomicU64::new(max_rate),
            logger,
        }
    }

    /// Current per-worker ceiling in packets/sec
    pub fn ceiling(&self) -> u64 {
        self.ceiling.load(Ordering::Relaxed)
    }

    pub fn max_rate(&self) -> u64 {
        self.max_rate
    }

    pub fn floor(&self) -> u64 {
        self.policy.floor.min(self.max_rate)
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    /// Recompute the ceiling from `sample`, store it and return it
    pub fn permitted_rate(&self, sample: &ResourceSample) -> u64 {
        let previous = self
            .ceiling
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(self.policy.next_ceiling(current, sample, self.max_rate))
            })
            .unwrap_or_else(|current| current);
        self.policy.next_ceiling(previous, sample, self.max_rate)
    }
}

#[async_trait]
impl SampleObserver for RateController {
    async fn on_sample(&self, sample: &ResourceSample) {
        let previous = self.ceiling();
        let current = self.permitted_rate(sample);
        self.logger.log_rate_change(sample, previous, current).await;
    }
}

/// Per-worker pacing over fixed time slices
///
/// Within each slice a worker may send `ceil(ceiling * slice)` packets (at
/// least one); past that it waits for the slice to end.
#[derive(Debug)]
pub struct SlicePacer {
    slice: Duration,
    slice_start: Instant,
    sent_in_slice: u64,
}

impl SlicePacer {
    pub const DEFAULT_SLICE: Duration = Duration::from_millis(100);

    pub fn new(slice: Duration) -> Self {
        Self {
            slice,
            slice_start: Instant::now(),
            sent_in_slice: 0,
        }
    }

    /// Sends permitted per slice at `ceiling` packets/sec
    pub fn allowed_per_slice(&self, ceiling: u64) -> u64 {
        ((ceiling as f64 * self.slice.as_secs_f64()).ceil() as u64).max(1)
    }

    /// Claim one send at `now`; returns how long to wait when the slice is used up
    pub fn reserve(&mut self, ceiling: u64, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.slice_start);
        if elapsed >= self.slice {
            self.slice_start = now;
            self.sent_in_slice = 0;
        } else if self.sent_in_slice >= self.allowed_per_slice(ceiling) {
            return Some(self.slice - elapsed);
        }

        self.sent_in_slice += 1;
        None
    }
}

impl Default for SlicePacer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SLICE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(cpu: f32, memory: f32) -> ResourceSample {
        ResourceSample::now(cpu, memory)
    }

    fn controller(workers: usize, packet_size: usize) -> RateController {
        RateController::new(RatePolicy::default(), workers, packet_size, EngineLogger::quiet())
    }

    #[test]
    fn test_max_rate_bounds() {
        let policy = RatePolicy::default();
        // 10 x 1024 B: bandwidth bound is 12 207 pps per worker
        assert_eq!(policy.max_rate(10, 1024), 12_207);
        // Tiny packets hit the default maximum
        assert_eq!(policy.max_rate(1, 64), 50_000);
        // Huge pools never go below the floor
        assert_eq!(policy.max_rate(500, 65_507), 10);
    }

    #[test]
    fn test_starts_at_maximum() {
        let rate = controller(4, 512);
        assert_eq!(rate.ceiling(), rate.max_rate());
    }

    #[test]
    fn test_load_levels() {
        let policy = RatePolicy::default();
        assert_eq!(policy.load_level(&sample(95.0, 10.0)), LoadLevel::High);
        assert_eq!(policy.load_level(&sample(10.0, 91.0)), LoadLevel::High);
        assert_eq!(policy.load_level(&sample(80.0, 10.0)), LoadLevel::Moderate);
        assert_eq!(policy.load_level(&sample(10.0, 80.0)), LoadLevel::Moderate);
        assert_eq!(policy.load_level(&sample(10.0, 10.0)), LoadLevel::Low);
    }

    #[test]
    fn test_backoff_then_recover() {
        let rate = controller(4, 512);
        let max = rate.max_rate();

        assert_eq!(rate.permitted_rate(&sample(95.0, 50.0)), max / 2);
        assert_eq!(rate.permitted_rate(&sample(80.0, 50.0)), max / 2);
        assert!(rate.permitted_rate(&sample(20.0, 20.0)) > max / 2);

        for _ in 0..20 {
            rate.permitted_rate(&sample(5.0, 5.0));
        }
        assert_eq!(rate.ceiling(), max);
    }

    #[test]
    fn test_floor_holds() {
        let rate = controller(1, 64);
        for _ in 0..40 {
            rate.permitted_rate(&sample(100.0, 100.0));
        }
        assert_eq!(rate.ceiling(), rate.floor());
        assert_eq!(rate.floor(), 10);
    }

    #[test]
    fn test_ramp_from_floor_is_at_least_one() {
        let policy = RatePolicy::default();
        assert_eq!(policy.next_ceiling(1, &sample(0.0, 0.0), 100), 10);
        assert_eq!(policy.next_ceiling(10, &sample(0.0, 0.0), 100), 12);
        assert_eq!(policy.next_ceiling(99, &sample(0.0, 0.0), 100), 100);
    }

    #[tokio::test]
    async fn test_observer_updates_ceiling() {
        let rate = controller(2, 1000);
        let before = rate.ceiling();
        rate.on_sample(&sample(99.0, 10.0)).await;
        assert!(rate.ceiling() < before);
    }

    #[test]
    fn test_pacer_blocks_after_slice_quota() {
        let start = Instant::now();
        let mut pacer = SlicePacer::new(Duration::from_millis(100));
        pacer.slice_start = start;

        // 30 pps over 100 ms slices: 3 sends per slice
        assert_eq!(pacer.allowed_per_slice(30), 3);
        for _ in 0..3 {
            assert!(pacer.reserve(30, start).is_none());
        }
        let wait = pacer.reserve(30, start + Duration::from_millis(40)).unwrap();
        assert_eq!(wait, Duration::from_millis(60));

        // A new slice resets the quota
        assert!(pacer.reserve(30, start + Duration::from_millis(100)).is_none());
    }

    #[test]
    fn test_pacer_allows_one_per_slice_minimum() {
        let pacer = SlicePacer::default();
        assert_eq!(pacer.allowed_per_slice(1), 1);
        assert_eq!(pacer.allowed_per_slice(0), 1);
        assert_eq!(pacer.allowed_per_slice(50_000), 5_000);
    }

    proptest! {
        #[test]
        fn prop_rising_load_never_raises_ceiling(
            workers in 1usize..500,
            packet_size in 1usize..65507,
            mut cpus in proptest::collection::vec(90.0f32..=100.0, 1..40),
        ) {
            cpus.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let rate = controller(workers, packet_size);

            let mut previous = rate.ceiling();
            for cpu in cpus {
                let current = rate.permitted_rate(&sample(cpu, 10.0));
                prop_assert!(current < previous || current == rate.floor());
                prop_assert!(current >= rate.floor());
                previous = current;
            }
        }

        #[test]
        fn prop_falling_load_never_lowers_ceiling(
            workers in 1usize..500,
            packet_size in 1usize..65507,
            drops in 0usize..20,
            mut cpus in proptest::collection::vec(0.0f32..70.0, 1..40),
        ) {
            cpus.sort_by(|a, b| b.partial_cmp(a).unwrap());
            let rate = controller(workers, packet_size);
            for _ in 0..drops {
                rate.permitted_rate(&sample(100.0, 100.0));
            }

            let mut previous = rate.ceiling();
            for cpu in cpus {
                let current = rate.permitted_rate(&sample(cpu, 10.0));
                prop_assert!(current > previous || current == rate.max_rate());
                prop_assert!(current <= rate.max_rate());
                previous = current;
            }
        }

        #[test]
        fn prop_ceiling_stays_in_bounds(
            workers in 1usize..500,
            packet_size in 1usize..65507,
            samples in proptest::collection::vec((0.0f32..=100.0, 0.0f32..=100.0), 0..60),
        ) {
            let rate = controller(workers, packet_size);
            for (cpu, memory) in samples {
                let current = rate.permitted_rate(&sample(cpu, memory));
                prop_assert!(current >= rate.floor());
                prop_assert!(current <= rate.max_rate());
            }
        }
    }
}
