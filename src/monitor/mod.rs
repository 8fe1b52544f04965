//! Host resource monitoring
//!
//! A background task samples CPU and memory utilization at a fixed interval,
//! keeps the newest sample plus a bounded history, and pushes every sample to
//! a [`SampleObserver`]. Sampling failures are logged and counted; the last
//! good sample stays current.

use crate::{
    error::{AppError, Result},
    logging::EngineLogger,
    models::ResourceSample,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Number of samples kept in the rolling history
pub const HISTORY_LEN: usize = 60;

/// Source of resource measurements
pub trait ResourceProbe: Send + 'static {
    /// Take one measurement
    fn sample(&mut self) -> Result<ResourceSample>;
}

/// Receives every successful sample
#[async_trait]
pub trait SampleObserver: Send + Sync {
    async fn on_sample(&self, sample: &ResourceSample);
}

/// Production probe backed by `sysinfo`
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between two refreshes; prime the first one
        system.refresh_cpu();
        Self { system }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for SysinfoProbe {
    fn sample(&mut self) -> Result<ResourceSample> {
        self.system.refresh_cpu();
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(AppError::monitor("Total memory reported as zero"));
        }

        let cpu = self.system.global_cpu_info().cpu_usage();
        if !cpu.is_finite() {
            return Err(AppError::monitor("CPU usage is not a finite number"));
        }

        let memory = self.system.used_memory() as f64 / total as f64 * 100.0;
        Ok(ResourceSample::now(cpu, memory as f32))
    }
}

/// Static facts about the host, shown in the run banner
#[derive(Debug, Clone)]
pub struct HostInfo {
    /// Number of logical CPU cores
    pub cpu_cores: usize,
    /// Total memory in bytes, if known
    pub total_memory: Option<u64>,
}

impl HostInfo {
    pub fn detect() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        let total = system.total_memory();

        Self {
            cpu_cores: num_cpus::get(),
            total_memory: (total > 0).then_some(total),
        }
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    history: VecDeque<ResourceSample>,
    peak_cpu: Option<f32>,
    peak_memory: Option<f32>,
}

/// Periodic resource sampler shared between the runner and dashboards
pub struct ResourceMonitor {
    interval: Duration,
    state: RwLock<MonitorState>,
    sampling_failures: AtomicU64,
    handle: Mutex<Option<JoinHandle<()>>>,
    logger: EngineLogger,
}

impl ResourceMonitor {
    pub fn new(interval: Duration, logger: EngineLogger) -> Self {
        Self {
            interval,
            state: RwLock::new(MonitorState {
                history: VecDeque::with_capacity(HISTORY_LEN),
                ..MonitorState::default()
            }),
            sampling_failures: AtomicU64::new(0),
            handle: Mutex::new(None),
            logger,
        }
    }

    /// Launch the sampling loop; it runs until `stop_rx` turns true
    pub async fn start(
        self: &Arc<Self>,
        probe: Box<dyn ResourceProbe>,
        observer: Arc<dyn SampleObserver>,
        stop_rx: watch::Receiver<bool>,
    ) {
        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            monitor.sampling_loop(probe, observer, stop_rx).await;
        });
        *self.handle.lock().await = Some(handle);
    }

    async fn sampling_loop(
        &self,
        mut probe: Box<dyn ResourceProbe>,
        observer: Arc<dyn SampleObserver>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        // First tick one interval out, so the first CPU delta spans a full interval
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_failures = 0u64;

        loop {
            if *stop_rx.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            match probe.sample() {
                Ok(sample) => {
                    consecutive_failures = 0;
                    self.record(sample).await;
                    observer.on_sample(&sample).await;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    self.sampling_failures.fetch_add(1, Ordering::Relaxed);
                    self.logger.log_sampling_failure(&e, consecutive_failures).await;
                }
            }
        }
    }

    async fn record(&self, sample: ResourceSample) {
        let mut state = self.state.write().await;
        if state.history.len() == HISTORY_LEN {
            state.history.pop_front();
        }
        state.history.push_back(sample);

        state.peak_cpu = Some(state.peak_cpu.map_or(sample.cpu_percent, |p| p.max(sample.cpu_percent)));
        state.peak_memory = Some(state.peak_memory.map_or(sample.memory_percent, |p| p.max(sample.memory_percent)));
    }

    /// Wait for the sampling loop to exit after the stop signal
    ///
    /// Bounded by one sampling interval plus a grace period; a loop stuck in
    /// a probe call past that is aborted.
    pub async fn stop(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(mut handle) = handle {
            let grace = self.interval + Duration::from_millis(500);
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                handle.abort();
            }
        }
    }

    /// Most recent sample, `None` before the first one
    pub async fn latest(&self) -> Option<ResourceSample> {
        self.state.read().await.history.back().copied()
    }

    /// Rolling history, oldest first
    pub async fn history(&self) -> Vec<ResourceSample> {
        self.state.read().await.history.iter().copied().collect()
    }

    /// Highest CPU and memory utilization seen so far
    pub async fn peaks(&self) -> (Option<f32>, Option<f32>) {
        let state = self.state.read().await;
        (state.peak_cpu, state.peak_memory)
    }

    pub fn sampling_failures(&self) -> u64 {
        self.sampling_failures.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
