//! Worker pool: one send loop per socket
//!
//! Workers are tokio tasks. Each opens its own socket, then loops until the
//! shared stop signal turns true: read the rate ceiling, pace, build a
//! packet, send with a timeout and record the outcome. A socket that cannot be
//! opened only takes down its own worker.

use super::{PacketSink, PayloadBuilder, RateController, SlicePacer, SocketFactory};
use crate::{
    logging::EngineLogger,
    models::TestConfig,
    stats::StatsAggregator,
    types::FailureKind,
};
use futures::future::join_all;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Per-run parameters handed to every worker
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub target: SocketAddr,
    pub workers: usize,
    pub packet_size: usize,
    pub send_timeout: Duration,
    pub pacing_slice: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &TestConfig, target: SocketAddr) -> Self {
        Self {
            target,
            workers: config.thread_count,
            packet_size: config.packet_size,
            send_timeout: config.send_timeout(),
            pacing_slice: SlicePacer::DEFAULT_SLICE,
        }
    }
}

/// Result of waiting for workers after the stop signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownOutcome {
    /// Workers that returned on their own
    pub exited: usize,
    /// Workers aborted after the timeout
    pub abandoned: usize,
}

impl ShutdownOutcome {
    pub fn force_stopped(&self) -> bool {
        self.abandoned > 0
    }
}

/// Decrements the active-worker count when the worker ends, even on abort
struct ActiveWorker(Arc<AtomicUsize>);

impl ActiveWorker {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Worker {
    id: usize,
    settings: PoolSettings,
    stats: Arc<StatsAggregator>,
    rate: Arc<RateController>,
    stop: watch::Receiver<bool>,
    active: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    logger: EngineLogger,
}

impl Worker {
    async fn run(mut self, factory: Arc<dyn SocketFactory>) {
        let mut sink = match factory.open(self.id, self.settings.target).await {
            Ok(sink) => sink,
            Err(e) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                self.logger.log_socket_failure(self.id, &e).await;
                return;
            }
        };

        let _active = ActiveWorker::enter(&self.active);
        self.logger.log_worker_started(self.id, sink.local_addr()).await;

        let mut payload = PayloadBuilder::new(self.settings.packet_size);
        let mut pacer = SlicePacer::new(self.settings.pacing_slice);

        loop {
            if *self.stop.borrow() {
                break;
            }

            if let Some(wait) = pacer.reserve(self.rate.ceiling(), Instant::now()) {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    changed = self.stop.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            }

            self.send_one(sink.as_mut(), &mut payload).await;
        }

        self.logger.log_worker_exit(self.id, payload.sequence()).await;
    }

    async fn send_one(&self, sink: &mut dyn PacketSink, payload: &mut PayloadBuilder) {
        let packet = payload.next_packet();
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.settings.send_timeout, sink.send_to(packet, self.settings.target)).await;
        let latency = started.elapsed();

        match outcome {
            Ok(Ok(_)) => self.stats.record_send(true, packet.len(), Some(latency)),
            Ok(Err(e)) => {
                let kind = FailureKind::from_io_error(&e);
                self.stats.record_failure(kind, None);
                self.logger.log_send_failure(self.id, kind, &e.to_string()).await;
            }
            Err(_) => {
                self.stats.record_failure(FailureKind::Timeout, None);
                self.logger
                    .log_send_failure(self.id, FailureKind::Timeout, "send timed out")
                    .await;
            }
        }
    }
}

/// Cloneable view of worker counts that outlives the pool handle
#[derive(Debug, Clone)]
pub struct WorkerActivity {
    active: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl WorkerActivity {
    /// Workers currently holding an open socket
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Workers whose socket could not be opened
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Running set of send workers
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    configured: usize,
    active: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `settings.workers` workers; they run until `stop` turns true
    pub fn spawn(
        settings: PoolSettings,
        factory: Arc<dyn SocketFactory>,
        stats: Arc<StatsAggregator>,
        rate: Arc<RateController>,
        stop: watch::Receiver<bool>,
        logger: EngineLogger,
    ) -> Self {
        let active = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let handles = (0..settings.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    settings: settings.clone(),
                    stats: Arc::clone(&stats),
                    rate: Arc::clone(&rate),
                    stop: stop.clone(),
                    active: Arc::clone(&active),
                    failed: Arc::clone(&failed),
                    logger: logger.clone(),
                };
                tokio::spawn(worker.run(Arc::clone(&factory)))
            })
            .collect();

        Self {
            handles,
            configured: settings.workers,
            active,
            failed,
        }
    }

    /// Workers currently holding an open socket
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Workers whose socket could not be opened
    pub fn failed_workers(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn configured_workers(&self) -> usize {
        self.configured
    }

    pub fn activity(&self) -> WorkerActivity {
        WorkerActivity {
            active: Arc::clone(&self.active),
            failed: Arc::clone(&self.failed),
        }
    }

    /// Wait up to `timeout` for every worker to exit, aborting the rest
    ///
    /// The stop signal must already have been sent.
    pub async fn shutdown(self, timeout: Duration) -> ShutdownOutcome {
        let deadline = Instant::now() + timeout;

        let results = join_all(self.handles.into_iter().map(|mut handle| async move {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(_) => true,
                Err(_) => {
                    handle.abort();
                    false
                }
            }
        }))
        .await;

        let exited = results.iter().filter(|exited| **exited).count();
        ShutdownOutcome {
            exited,
            abandoned: results.len() - exited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::executor::RatePolicy;
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::AtomicU64;

    /// Counts datagrams without touching the network
    struct CountingSink {
        sent: Arc<AtomicU64>,
    }

    #[async_trait]
    impl PacketSink for CountingSink {
        async fn send_to(&mut self, payload: &[u8], _target: SocketAddr) -> io::Result<usize> {
            self.sent.fetch_add(1, Ordering::Relaxed);
            tokio::task::yield_now().await;
            Ok(payload.len())
        }
    }

    struct CountingFactory {
        sent: Arc<AtomicU64>,
        fail_ids: Vec<usize>,
    }

    #[async_trait]
    impl SocketFactory for CountingFactory {
        async fn open(&self, worker_id: usize, _target: SocketAddr) -> Result<Box<dyn PacketSink>> {
            if self.fail_ids.contains(&worker_id) {
                return Err(AppError::socket("no descriptors left"));
            }
            Ok(Box::new(CountingSink { sent: Arc::clone(&self.sent) }))
        }
    }

    /// Every send fails with the given error kind
    struct RefusingSink;

    #[async_trait]
    impl PacketSink for RefusingSink {
        async fn send_to(&mut self, _payload: &[u8], _target: SocketAddr) -> io::Result<usize> {
            tokio::task::yield_now().await;
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }

    struct RefusingFactory;

    #[async_trait]
    impl SocketFactory for RefusingFactory {
        async fn open(&self, _worker_id: usize, _target: SocketAddr) -> Result<Box<dyn PacketSink>> {
            Ok(Box::new(RefusingSink))
        }
    }

    /// Never completes a send
    struct StuckSink;

    #[async_trait]
    impl PacketSink for StuckSink {
        async fn send_to(&mut self, _payload: &[u8], _target: SocketAddr) -> io::Result<usize> {
            std::future::pending().await
        }
    }

    struct StuckFactory;

    #[async_trait]
    impl SocketFactory for StuckFactory {
        async fn open(&self, _worker_id: usize, _target: SocketAddr) -> Result<Box<dyn PacketSink>> {
            Ok(Box::new(StuckSink))
        }
    }

    fn settings(workers: usize, packet_size: usize) -> PoolSettings {
        PoolSettings {
            target: "127.0.0.1:9999".parse().unwrap(),
            workers,
            packet_size,
            send_timeout: Duration::from_millis(200),
            pacing_slice: SlicePacer::DEFAULT_SLICE,
        }
    }

    fn rate(workers: usize, packet_size: usize) -> Arc<RateController> {
        Arc::new(RateController::new(RatePolicy::default(), workers, packet_size, EngineLogger::quiet()))
    }

    #[tokio::test]
    async fn test_workers_send_until_stopped() {
        let sent = Arc::new(AtomicU64::new(0));
        let factory = Arc::new(CountingFactory { sent: Arc::clone(&sent), fail_ids: vec![] });
        let stats = Arc::new(StatsAggregator::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let pool = WorkerPool::spawn(settings(3, 128), factory, Arc::clone(&stats), rate(3, 128), stop_rx, EngineLogger::quiet());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(pool.active_workers(), 3);

        stop_tx.send_replace(true);
        let outcome = pool.shutdown(Duration::from_secs(2)).await;
        assert_eq!(outcome, ShutdownOutcome { exited: 3, abandoned: 0 });

        let snapshot = stats.snapshot();
        assert!(snapshot.packets_sent > 0);
        assert_eq!(snapshot.packets_sent, sent.load(Ordering::Relaxed));
        assert_eq!(snapshot.bytes_sent, snapshot.successes * 128);
    }

    #[tokio::test]
    async fn test_socket_failure_only_kills_that_worker() {
        let sent = Arc::new(AtomicU64::new(0));
        let factory = Arc::new(CountingFactory { sent, fail_ids: vec![0, 2] });
        let (stop_tx, stop_rx) = watch::channel(false);

        let pool = WorkerPool::spawn(settings(4, 64), factory, Arc::new(StatsAggregator::new()), rate(4, 64), stop_rx, EngineLogger::quiet());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pool.failed_workers(), 2);
        assert_eq!(pool.active_workers(), 2);

        stop_tx.send_replace(true);
        let outcome = pool.shutdown(Duration::from_secs(2)).await;
        assert_eq!(outcome.exited, 4);
    }

    #[tokio::test]
    async fn test_send_errors_are_counted_and_workers_continue() {
        let stats = Arc::new(StatsAggregator::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let pool = WorkerPool::spawn(settings(2, 64), Arc::new(RefusingFactory), Arc::clone(&stats), rate(2, 64), stop_rx, EngineLogger::quiet());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pool.active_workers(), 2);
        stop_tx.send_replace(true);
        pool.shutdown(Duration::from_secs(2)).await;

        let snapshot = stats.snapshot();
        assert!(snapshot.failures > 1);
        assert_eq!(snapshot.successes, 0);
        assert_eq!(snapshot.bytes_sent, 0);
        assert_eq!(snapshot.failures_of(FailureKind::Refused), snapshot.failures);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_send_times_out() {
        let stats = Arc::new(StatsAggregator::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let pool = WorkerPool::spawn(settings(1, 64), Arc::new(StuckFactory), Arc::clone(&stats), rate(1, 64), stop_rx, EngineLogger::quiet());

        tokio::time::sleep(Duration::from_millis(450)).await;
        stop_tx.send_replace(true);
        let outcome = pool.shutdown(Duration::from_secs(1)).await;

        assert_eq!(outcome.abandoned, 0);
        assert!(stats.snapshot().failures_of(FailureKind::Timeout) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_workers_past_deadline() {
        let stats = Arc::new(StatsAggregator::new());
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut stuck = settings(2, 64);
        stuck.send_timeout = Duration::from_secs(3600);

        let pool = WorkerPool::spawn(stuck, Arc::new(StuckFactory), stats, rate(2, 64), stop_rx, EngineLogger::quiet());
        tokio::time::sleep(Duration::from_millis(10)).await;

        stop_tx.send_replace(true);
        let activity = pool.activity();
        let outcome = pool.shutdown(Duration::from_millis(500)).await;

        assert_eq!(outcome, ShutdownOutcome { exited: 0, abandoned: 2 });
        assert!(outcome.force_stopped());

        // Aborted tasks drop their guard once the runtime reaps them
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(activity.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_respects_ceiling() {
        let sent = Arc::new(AtomicU64::new(0));
        let factory = Arc::new(CountingFactory { sent: Arc::clone(&sent), fail_ids: vec![] });
        let stats = Arc::new(StatsAggregator::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        // 500 workers of 65507 bytes pins the ceiling at the 10 pps floor
        let rate = rate(500, 65_507);
        assert_eq!(rate.ceiling(), 10);

        let pool = WorkerPool::spawn(settings(1, 64), factory, Arc::clone(&stats), rate, stop_rx, EngineLogger::quiet());
        tokio::time::sleep(Duration::from_millis(1_050)).await;
        stop_tx.send_replace(true);
        pool.shutdown(Duration::from_secs(1)).await;

        // One send per 100 ms slice over ~1 s
        let total = stats.snapshot().packets_sent;
        assert!((10..=12).contains(&total), "sent {}", total);
    }
}
