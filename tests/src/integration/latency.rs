//! # End-to-End Latency
//!
//! Full ping-pong benchmark runs against the in-process bus: every
//! round-trip measured, percentile ordering holds, histogram counts
//! reconcile, and threshold gating behaves on both sides.

#[cfg(test)]
mod tests {
    use mesh_bench::{percentile, run_ping_pong_test, BenchConfig, HISTOGRAM_BOUNDS_MS};
    use mesh_bus::{InMemoryDurableBus, MessageBus};
    use std::sync::Arc;
    use std::time::Duration;

    fn config(count: usize) -> BenchConfig {
        BenchConfig {
            message_count: count,
            concurrency: 10,
            payload_bytes: 256,
            warmup_count: 100,
            duration_ceiling: Duration::from_secs(30),
            // Generous thresholds; this test verifies accounting, not
            // machine speed.
            p50_threshold_ms: 1_000.0,
            p95_threshold_ms: 2_000.0,
            skip: false,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_thousand_message_run_accounts_for_every_round_trip() {
        let bus: Arc<dyn MessageBus> = Arc::new(InMemoryDurableBus::new());
        let result = run_ping_pong_test(bus, &config(1000)).await.unwrap();

        assert_eq!(result.messages_sent, 1000);
        assert_eq!(result.messages_received, 1000);
        assert_eq!(result.errors, 0);
        assert!(!result.timed_out);
        assert!(!result.skipped);

        // Percentiles are ordered and bounded by the extremes.
        assert!(result.min_ms <= result.p50_ms);
        assert!(result.p50_ms <= result.p95_ms);
        assert!(result.p95_ms <= result.p99_ms);
        assert!(result.p99_ms <= result.max_ms);
        assert!(result.avg_ms >= result.min_ms && result.avg_ms <= result.max_ms);

        // Histogram reconciles with the received count.
        assert_eq!(result.histogram.len(), HISTOGRAM_BOUNDS_MS.len() + 1);
        let total: u64 = result.histogram.iter().map(|b| b.count).sum();
        assert_eq!(total, result.messages_received);

        assert!(result.p50_passed);
        assert!(result.p95_passed);
        assert!(result.overall_passed);
        assert!(result.elapsed_ms > 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_impossible_thresholds_fail_the_gate() {
        let bus: Arc<dyn MessageBus> = Arc::new(InMemoryDurableBus::new());
        let mut cfg = config(50);
        cfg.warmup_count = 0;
        cfg.p50_threshold_ms = 0.0;
        cfg.p95_threshold_ms = 0.0;

        let result = run_ping_pong_test(bus, &cfg).await.unwrap();
        assert_eq!(result.messages_received, 50);
        assert!(!result.p50_passed);
        assert!(!result.p95_passed);
        assert!(!result.overall_passed);
    }

    #[tokio::test]
    async fn test_gate_flags_are_independent() {
        let bus: Arc<dyn MessageBus> = Arc::new(InMemoryDurableBus::new());
        let mut cfg = config(50);
        cfg.warmup_count = 0;
        // p50 generous, p95 impossible: exactly one flag trips.
        cfg.p50_threshold_ms = 10_000.0;
        cfg.p95_threshold_ms = 0.0;

        let result = run_ping_pong_test(bus, &cfg).await.unwrap();
        assert!(result.p50_passed);
        assert!(!result.p95_passed);
        assert!(!result.overall_passed);
    }

    #[test]
    fn test_percentile_reference_fixture() {
        // 1..=100 milliseconds: the k-th percentile is exactly k.
        let samples: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(percentile(&samples, 50), 50.0);
        assert_eq!(percentile(&samples, 95), 95.0);
        assert_eq!(percentile(&samples, 99), 99.0);
    }
}
