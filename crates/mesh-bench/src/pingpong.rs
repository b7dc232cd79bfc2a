//! Round-trip latency benchmark over the bus.

use crate::config::BenchConfig;
use crate::percentile::{histogram, percentile, HistogramBucket};
use crate::BenchError;
use mesh_bus::{handler_fn, HandlerError, MessageBus, PublishContext};
use mesh_envelope::{CanonicalCodec, Message, MessageType};
use mesh_routing::{agent_in, agent_out};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Tenant namespace the benchmark runs in.
const BENCH_TENANT: &str = "bench";

/// Echo entity id; pings go to its inbox, pongs come from its outbox.
const ECHO_AGENT: &str = "echo";

/// Aggregated outcome of one benchmark run. Created fresh per run,
/// never mutated after computation.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    /// Pings published in the main phase.
    pub messages_sent: u64,
    /// Pongs received and measured in the main phase.
    pub messages_received: u64,
    /// Publish failures plus round-trips lost to the duration ceiling.
    pub errors: u64,
    /// True when the duration ceiling elapsed before all round-trips
    /// completed.
    pub timed_out: bool,
    /// True when performance testing was skipped by configuration.
    pub skipped: bool,

    /// Minimum round-trip latency, milliseconds.
    pub min_ms: f64,
    /// Maximum round-trip latency, milliseconds.
    pub max_ms: f64,
    /// Mean round-trip latency, milliseconds.
    pub avg_ms: f64,
    /// 50th percentile latency, milliseconds.
    pub p50_ms: f64,
    /// 95th percentile latency, milliseconds.
    pub p95_ms: f64,
    /// 99th percentile latency, milliseconds.
    pub p99_ms: f64,

    /// Latency histogram; bucket counts sum to `messages_received`.
    pub histogram: Vec<HistogramBucket>,

    /// p50 within the configured threshold.
    pub p50_passed: bool,
    /// p95 within the configured threshold.
    pub p95_passed: bool,
    /// `p50_passed && p95_passed`.
    pub overall_passed: bool,

    /// Main-phase wall-clock duration, milliseconds.
    pub elapsed_ms: f64,
}

impl BenchmarkResult {
    fn skipped() -> Self {
        Self {
            messages_sent: 0,
            messages_received: 0,
            errors: 0,
            timed_out: false,
            skipped: true,
            min_ms: 0.0,
            max_ms: 0.0,
            avg_ms: 0.0,
            p50_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            histogram: Vec::new(),
            p50_passed: true,
            p95_passed: true,
            overall_passed: true,
            elapsed_ms: 0.0,
        }
    }
}

struct PhaseOutcome {
    sent: u64,
    received: u64,
    publish_errors: u64,
    timed_out: bool,
    samples: Vec<f64>,
    elapsed: Duration,
}

/// Run the full ping-pong benchmark: echo subscriber, optional warmup
/// phase (discarded), main phase, percentile computation, and threshold
/// gating.
///
/// # Errors
///
/// - `BenchError::Config` on invalid parameters.
/// - `BenchError::Bus` when the echo or receiver subscriptions cannot
///   be created.
pub async fn run_ping_pong_test(
    bus: Arc<dyn MessageBus>,
    config: &BenchConfig,
) -> Result<BenchmarkResult, BenchError> {
    config.validate()?;
    if config.skip {
        info!("Performance testing skipped by configuration");
        return Ok(BenchmarkResult::skipped());
    }

    let ctx = PublishContext::default();
    let codec = Arc::new(CanonicalCodec::new());
    let ping_subject = agent_in(BENCH_TENANT, ECHO_AGENT);
    let pong_subject = agent_out(BENCH_TENANT, ECHO_AGENT);

    // Echo side: every ping comes back as a pong carrying the original
    // send timestamp and phase marker.
    let echo_bus = bus.clone();
    let echo_codec = codec.clone();
    let echo_pong_subject = pong_subject.clone();
    let _echo_sub = bus
        .subscribe(
            &ctx,
            &ping_subject,
            handler_fn(move |ping: Message| {
                let bus = echo_bus.clone();
                let codec = echo_codec.clone();
                let pong_subject = echo_pong_subject.clone();
                async move {
                    let mut pong = Message::new(
                        ECHO_AGENT,
                        ping.from.clone(),
                        MessageType::Response,
                        ping.payload.clone(),
                    );
                    pong.metadata = ping.metadata.clone();
                    let pong = codec
                        .seal(pong)
                        .map_err(|e| HandlerError::Failed(e.to_string()))?;
                    bus.publish(&PublishContext::default(), &pong_subject, pong)
                        .await
                        .map_err(|e| HandlerError::Failed(e.to_string()))
                }
            }),
        )
        .await?;

    if config.warmup_count > 0 {
        let warmup = run_phase(
            bus.clone(),
            &codec,
            config,
            &ping_subject,
            &pong_subject,
            config.warmup_count,
        )
        .await?;
        // Warmup results are discarded; counters start fresh below.
        info!(
            warmed_up = warmup.received,
            "Warmup phase complete, samples discarded"
        );
    }

    let outcome = run_phase(
        bus.clone(),
        &codec,
        config,
        &ping_subject,
        &pong_subject,
        config.message_count,
    )
    .await?;

    let mut samples = outcome.samples;
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let received = outcome.received;
    let lost = outcome.sent.saturating_sub(received);
    let p50 = percentile(&samples, 50);
    let p95 = percentile(&samples, 95);
    let p50_passed = received > 0 && p50 <= config.p50_threshold_ms;
    let p95_passed = received > 0 && p95 <= config.p95_threshold_ms;

    let result = BenchmarkResult {
        messages_sent: outcome.sent,
        messages_received: received,
        errors: outcome.publish_errors + if outcome.timed_out { lost } else { 0 },
        timed_out: outcome.timed_out,
        skipped: false,
        min_ms: samples.first().copied().unwrap_or(0.0),
        max_ms: samples.last().copied().unwrap_or(0.0),
        avg_ms: if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f64>() / samples.len() as f64
        },
        p50_ms: p50,
        p95_ms: p95,
        p99_ms: percentile(&samples, 99),
        histogram: histogram(&samples),
        p50_passed,
        p95_passed,
        overall_passed: p50_passed && p95_passed,
        elapsed_ms: outcome.elapsed.as_secs_f64() * 1000.0,
    };

    if result.timed_out {
        warn!(
            sent = result.messages_sent,
            received = result.messages_received,
            "Benchmark hit the duration ceiling before completing"
        );
    }
    info!(
        p50_ms = result.p50_ms,
        p95_ms = result.p95_ms,
        passed = result.overall_passed,
        "Ping-pong benchmark complete"
    );

    Ok(result)
}

async fn run_phase(
    bus: Arc<dyn MessageBus>,
    codec: &Arc<CanonicalCodec>,
    config: &BenchConfig,
    ping_subject: &str,
    pong_subject: &str,
    count: usize,
) -> Result<PhaseOutcome, BenchError> {
    let ctx = PublishContext::default();
    let phase_id = Uuid::new_v4().to_string();

    let sent = Arc::new(AtomicU64::new(0));
    let received = Arc::new(AtomicU64::new(0));
    let publish_errors = Arc::new(AtomicU64::new(0));
    // The sample buffer and the counters are the only mutable shared
    // state in the harness.
    let samples: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::with_capacity(count)));

    let receiver_phase = phase_id.clone();
    let receiver_samples = samples.clone();
    let receiver_count = received.clone();
    let receiver_sub = bus
        .subscribe(
            &ctx,
            pong_subject,
            handler_fn(move |pong: Message| {
                let phase_id = receiver_phase.clone();
                let samples = receiver_samples.clone();
                let received = receiver_count.clone();
                async move {
                    // Pongs straggling in from an earlier phase are
                    // acknowledged but not measured.
                    let same_phase = pong
                        .metadata
                        .get("bench_phase")
                        .and_then(|v| v.as_str())
                        .map(|p| p == phase_id)
                        .unwrap_or(false);
                    if !same_phase {
                        return Ok(());
                    }

                    let Some(sent_at) = pong
                        .metadata
                        .get("sent_at_us")
                        .and_then(serde_json::Value::as_u64)
                    else {
                        return Ok(());
                    };

                    let elapsed_ms = now_micros().saturating_sub(sent_at) as f64 / 1000.0;
                    if let Ok(mut buffer) = samples.lock() {
                        buffer.push(elapsed_ms);
                    }
                    received.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
            }),
        )
        .await?;

    let started = Instant::now();
    let deadline = started + config.duration_ceiling;

    // N concurrent workers share the total count.
    let per_worker = count / config.concurrency;
    let remainder = count % config.concurrency;
    let mut workers = Vec::with_capacity(config.concurrency);
    for worker in 0..config.concurrency {
        let quota = per_worker + usize::from(worker < remainder);
        if quota == 0 {
            continue;
        }

        let bus = bus.clone();
        let codec = codec.clone();
        let ping_subject = ping_subject.to_string();
        let phase_id = phase_id.clone();
        let sent = sent.clone();
        let publish_errors = publish_errors.clone();
        let payload_bytes = config.payload_bytes;

        workers.push(tokio::spawn(async move {
            let ctx = PublishContext::default();
            let filler: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(payload_bytes)
                .map(char::from)
                .collect();

            for n in 0..quota {
                let ping = Message::new(
                    format!("bench-worker-{worker}"),
                    ECHO_AGENT,
                    MessageType::Request,
                    json!({"seq": n, "data": filler}),
                )
                .with_metadata("bench_phase", json!(phase_id.clone()))
                .with_metadata("sent_at_us", json!(now_micros()));

                let sealed = match codec.seal(ping) {
                    Ok(msg) => msg,
                    Err(_) => {
                        publish_errors.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                };

                match bus.publish(&ctx, &ping_subject, sealed).await {
                    Ok(()) => {
                        sent.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => {
                        publish_errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }));
    }
    for worker in workers {
        let _ = worker.await;
    }

    // Completion: all round-trips measured, or the ceiling elapses.
    // Both paths terminate even if zero pongs ever arrive.
    let target = sent.load(Ordering::Relaxed);
    let mut timed_out = false;
    while received.load(Ordering::Relaxed) < target {
        if Instant::now() >= deadline {
            timed_out = true;
            break;
        }
        sleep(Duration::from_millis(2)).await;
    }

    let elapsed = started.elapsed();
    drop(receiver_sub);

    let collected = samples.lock().map(|s| s.clone()).unwrap_or_default();
    Ok(PhaseOutcome {
        sent: target,
        received: received.load(Ordering::Relaxed),
        publish_errors: publish_errors.load(Ordering::Relaxed),
        timed_out,
        samples: collected,
        elapsed,
    })
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
