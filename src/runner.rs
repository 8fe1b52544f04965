//! Run orchestration
//!
//! [`TestRunner`] owns one run from start to report. It moves through
//! `Idle -> Running -> Stopping -> Completed` exactly once: a runner is not
//! reusable. Duration expiry and [`TestRunner::cancel`] both flip the same
//! stop signal; a supervisor task then drains the workers, stops the monitor
//! and publishes the [`RunReport`].

use crate::{
    error::{AppError, Result},
    executor::{PoolSettings, RateController, RatePolicy, SocketFactory, UdpSocketFactory, WorkerActivity, WorkerPool},
    logging::EngineLogger,
    models::{ResourceSample, RunReport, StatsSnapshot, TestConfig},
    monitor::{ResourceMonitor, ResourceProbe, SampleObserver, SysinfoProbe},
    stats::StatsAggregator,
    types::RunState,
};
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::Instant;

/// Shared handles of the run in progress, for polling
#[derive(Clone)]
struct LiveRun {
    config: TestConfig,
    target: SocketAddr,
    stats: Arc<StatsAggregator>,
    monitor: Arc<ResourceMonitor>,
    rate: Arc<RateController>,
    workers: WorkerActivity,
    started: Instant,
    started_at: DateTime<Utc>,
}

struct RunnerInner {
    state: RwLock<RunState>,
    stop_tx: watch::Sender<bool>,
    report_tx: watch::Sender<Option<RunReport>>,
    live: RwLock<Option<LiveRun>>,
    socket_factory: Arc<dyn SocketFactory>,
    probe: Mutex<Option<Box<dyn ResourceProbe>>>,
    policy: RatePolicy,
    logger: EngineLogger,
}

impl RunnerInner {
    async fn transition(&self, to: RunState) {
        let from = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, to)
        };
        self.logger.log_state_transition(from, to).await;
    }
}

/// Configures the collaborators of a [`TestRunner`]
pub struct TestRunnerBuilder {
    socket_factory: Arc<dyn SocketFactory>,
    probe: Option<Box<dyn ResourceProbe>>,
    policy: RatePolicy,
    logger: EngineLogger,
}

impl TestRunnerBuilder {
    pub fn socket_factory(mut self, factory: Arc<dyn SocketFactory>) -> Self {
        self.socket_factory = factory;
        self
    }

    pub fn probe(mut self, probe: Box<dyn ResourceProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn rate_policy(mut self, policy: RatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn logger(mut self, logger: EngineLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> TestRunner {
        let (stop_tx, _) = watch::channel(false);
        let (report_tx, _) = watch::channel(None);

        TestRunner {
            inner: Arc::new(RunnerInner {
                state: RwLock::new(RunState::Idle),
                stop_tx,
                report_tx,
                live: RwLock::new(None),
                socket_factory: self.socket_factory,
                probe: Mutex::new(self.probe),
                policy: self.policy,
                logger: self.logger,
            }),
        }
    }
}

/// Single-use orchestrator for one traffic run
///
/// Cloning yields another handle to the same run.
#[derive(Clone)]
pub struct TestRunner {
    inner: Arc<RunnerInner>,
}

impl TestRunner {
    /// Runner with UDP sockets and the `sysinfo` probe
    pub fn new(logger: EngineLogger) -> Self {
        Self::builder().logger(logger).build()
    }

    pub fn builder() -> TestRunnerBuilder {
        TestRunnerBuilder {
            socket_factory: Arc::new(UdpSocketFactory),
            probe: None,
            policy: RatePolicy::default(),
            logger: EngineLogger::quiet(),
        }
    }

    /// Validate `config`, resolve the target and launch the monitor and workers
    ///
    /// Fails with an invalid-state error unless the runner is `Idle`. A
    /// configuration or resolution error leaves the runner `Idle`.
    pub async fn start(&self, config: TestConfig) -> Result<()> {
        let mut state = self.inner.state.write().await;
        if *state != RunState::Idle {
            return Err(AppError::invalid_state(format!(
                "Cannot start a runner that is {}",
                *state
            )));
        }

        config.validate()?;
        let target = resolve_target(&config).await?;

        let logger = self.inner.logger.clone();
        let stats = Arc::new(StatsAggregator::new());
        let rate = Arc::new(RateController::new(
            self.inner.policy.clone(),
            config.thread_count,
            config.packet_size,
            logger.clone(),
        ));

        let monitor = Arc::new(ResourceMonitor::new(config.sample_interval(), logger.clone()));
        let probe = self
            .inner
            .probe
            .lock()
            .await
            .take()
            .unwrap_or_else(|| Box::new(SysinfoProbe::new()));
        let observer: Arc<dyn SampleObserver> = rate.clone();
        monitor.start(probe, observer, self.inner.stop_tx.subscribe()).await;

        let stop_rx = self.inner.stop_tx.subscribe();
        let pool = WorkerPool::spawn(
            PoolSettings::from_config(&config, target),
            Arc::clone(&self.inner.socket_factory),
            Arc::clone(&stats),
            Arc::clone(&rate),
            self.inner.stop_tx.subscribe(),
            logger.clone(),
        );

        let live = LiveRun {
            config,
            target,
            stats,
            monitor,
            rate,
            workers: pool.activity(),
            started: Instant::now(),
            started_at: Utc::now(),
        };
        *self.inner.live.write().await = Some(live.clone());

        *state = RunState::Running;
        drop(state);

        logger.log_state_transition(RunState::Idle, RunState::Running).await;
        logger.log_run_started(&live.config, &live.target).await;

        tokio::spawn(supervise(Arc::clone(&self.inner), live, pool, stop_rx));
        Ok(())
    }

    /// Request an early stop; no-op unless the run is `Running`
    pub async fn cancel(&self) {
        let state = self.inner.state.read().await;
        if *state == RunState::Running {
            self.inner.stop_tx.send_replace(true);
        }
    }

    /// Wait for the run to complete and return its report
    pub async fn wait(&self) -> Result<RunReport> {
        if self.state().await == RunState::Idle {
            return Err(AppError::invalid_state("Runner has not been started"));
        }

        let mut report_rx = self.inner.report_tx.subscribe();
        loop {
            let current = report_rx.borrow_and_update().clone();
            if let Some(report) = current {
                return Ok(report);
            }
            report_rx
                .changed()
                .await
                .map_err(|_| AppError::internal("Run supervisor went away before reporting"))?;
        }
    }

    /// Start and wait in one call
    pub async fn run(&self, config: TestConfig) -> Result<RunReport> {
        self.start(config).await?;
        self.wait().await
    }

    pub async fn state(&self) -> RunState {
        *self.inner.state.read().await
    }

    /// Counters of the current run, `None` before start
    pub async fn live_stats(&self) -> Option<StatsSnapshot> {
        self.inner.live.read().await.as_ref().map(|live| live.stats.snapshot())
    }

    /// Newest resource sample of the current run
    pub async fn latest_sample(&self) -> Option<ResourceSample> {
        let monitor = self.inner.live.read().await.as_ref().map(|live| Arc::clone(&live.monitor))?;
        monitor.latest().await
    }

    /// Current per-worker rate ceiling
    pub async fn rate_ceiling(&self) -> Option<u64> {
        self.inner.live.read().await.as_ref().map(|live| live.rate.ceiling())
    }

    pub async fn active_workers(&self) -> Option<usize> {
        self.inner.live.read().await.as_ref().map(|live| live.workers.active())
    }

    /// Time since start
    pub async fn elapsed(&self) -> Option<Duration> {
        self.inner.live.read().await.as_ref().map(|live| live.started.elapsed())
    }

    /// Final report once `Completed`
    pub fn report(&self) -> Option<RunReport> {
        self.inner.report_tx.borrow().clone()
    }
}

async fn resolve_target(config: &TestConfig) -> Result<SocketAddr> {
    if let Some(addr) = config.literal_target() {
        return Ok(addr);
    }

    let label = config.target_label();
    let mut addrs = tokio::net::lookup_host((config.target_host(), config.target_port))
        .await
        .map_err(|e| AppError::dns_resolution(format!("Cannot resolve {}: {}", label, e)))?;

    addrs
        .next()
        .ok_or_else(|| AppError::dns_resolution(format!("No addresses found for {}", label)))
}

async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow_and_update() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn supervise(
    inner: Arc<RunnerInner>,
    live: LiveRun,
    pool: WorkerPool,
    mut stop_rx: watch::Receiver<bool>,
) {
    let cancelled = tokio::select! {
        _ = tokio::time::sleep(live.config.duration()) => false,
        _ = stop_requested(&mut stop_rx) => true,
    };

    inner.transition(RunState::Stopping).await;
    let active_workers_at_end = pool.active_workers();
    inner.stop_tx.send_replace(true);
    let elapsed = live.started.elapsed();

    let outcome = pool.shutdown(live.config.shutdown_timeout()).await;
    if outcome.force_stopped() {
        inner.logger.log_shutdown_timeout(outcome.abandoned).await;
    }

    live.monitor.stop().await;
    let snapshot = live.stats.snapshot();
    let (peak_cpu_percent, peak_memory_percent) = live.monitor.peaks().await;

    let report = RunReport {
        target: live.config.target_label(),
        resolved_target: live.target.to_string(),
        packet_size: live.config.packet_size,
        packets_sent: snapshot.packets_sent,
        bytes_sent: snapshot.bytes_sent,
        successes: snapshot.successes,
        failures: snapshot.failures,
        success_rate: snapshot.success_rate(),
        avg_latency: snapshot.average_latency(),
        max_latency: snapshot.max_latency(),
        elapsed,
        packets_per_second: per_second(snapshot.packets_sent, elapsed),
        configured_workers: live.config.thread_count,
        active_workers_at_end,
        failed_workers: live.workers.failed(),
        abandoned_workers: outcome.abandoned,
        force_stopped: outcome.force_stopped(),
        cancelled,
        sampling_failures: live.monitor.sampling_failures(),
        peak_cpu_percent,
        peak_memory_percent,
        final_rate_ceiling: live.rate.ceiling(),
        failure_breakdown: snapshot.failure_breakdown.clone(),
        started_at: live.started_at,
        completed_at: Utc::now(),
    };

    inner.logger.log_run_summary(&report).await;
    inner.transition(RunState::Completed).await;
    inner.report_tx.send_replace(Some(report));
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}
