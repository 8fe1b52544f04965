//! Concurrency and property tests for the stats aggregator

use super::StatsAggregator;
use crate::types::FailureKind;
use proptest::prelude::*;
use proptest::collection::vec;
use std::sync::Arc;
use std::time::Duration;

/// One generated send outcome: (success, latency in micros)
fn outcomes() -> impl Strategy<Value = Vec<(bool, Option<u64>)>> {
    vec((any::<bool>(), proptest::option::of(1u64..2_000_000)), 0..500)
}

proptest! {
    #[test]
    fn prop_counters_stay_consistent(sends in outcomes(), packet_size in 1usize..65507) {
        let stats = StatsAggregator::new();
        for (success, latency) in &sends {
            stats.record_send(*success, packet_size, latency.map(Duration::from_micros));
        }

        let snapshot = stats.snapshot();
        let expected_successes = sends.iter().filter(|(s, _)| *s).count() as u64;

        prop_assert_eq!(snapshot.packets_sent, sends.len() as u64);
        prop_assert_eq!(snapshot.packets_sent, snapshot.successes + snapshot.failures);
        prop_assert_eq!(snapshot.successes, expected_successes);
        prop_assert_eq!(snapshot.bytes_sent, snapshot.successes * packet_size as u64);
    }

    #[test]
    fn prop_average_latency_between_min_and_max(latencies in vec(1u64..1_000_000, 1..200)) {
        let stats = StatsAggregator::new();
        for micros in &latencies {
            stats.record_send(true, 1, Some(Duration::from_micros(*micros)));
        }

        let snapshot = stats.snapshot();
        let min = Duration::from_micros(*latencies.iter().min().unwrap());
        let max = Duration::from_micros(*latencies.iter().max().unwrap());

        prop_assert!(snapshot.average_latency() >= min);
        prop_assert!(snapshot.average_latency() <= max);
        prop_assert_eq!(snapshot.max_latency(), max);
    }
}

#[test]
fn test_no_lost_updates_across_threads() {
    let stats = Arc::new(StatsAggregator::new());
    let threads = 8;
    let per_thread = 10_000u64;

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let stats = stats.clone();
            std::thread::spawn(move || {
                for n in 0..per_thread {
                    if (n + i) % 4 == 0 {
                        stats.record_failure(FailureKind::WouldBlock, None);
                    } else {
                        stats.record_send(true, 100, Some(Duration::from_nanos(50)));
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.packets_sent, threads * per_thread);
    assert_eq!(snapshot.successes + snapshot.failures, snapshot.packets_sent);
    assert_eq!(snapshot.bytes_sent, snapshot.successes * 100);
    assert_eq!(snapshot.failures_of(FailureKind::WouldBlock), snapshot.failures);
    assert_eq!(snapshot.latency_count, snapshot.successes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_with_live_snapshots() {
    let stats = Arc::new(StatsAggregator::new());

    let writers: Vec<_> = (0..16)
        .map(|_| {
            let stats = stats.clone();
            tokio::spawn(async move {
                for _ in 0..1_000 {
                    stats.record_send(true, 64, None);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    // Live reads never see more outcomes than attempts
    for _ in 0..50 {
        let snapshot = stats.snapshot();
        assert!(snapshot.successes + snapshot.failures <= snapshot.packets_sent);
        tokio::task::yield_now().await;
    }

    for writer in writers {
        writer.await.unwrap();
    }

    assert_eq!(stats.snapshot().packets_sent, 16_000);
}
