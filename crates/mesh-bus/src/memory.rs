//! In-process durable bus with at-least-once, replayable delivery.
//!
//! Single shared, internally-synchronized connection handle reused by
//! all publishers and subscribers in the process. The durable log keeps
//! every published envelope in sequence order; consumers pull through
//! bounded channels so the in-flight window is the backpressure bound.

use crate::bus::{MessageBus, MessageHandler, PublishContext, Subscription};
use crate::config::{BusConfig, ConsumerConfig, DeliverPolicy, StreamConfig};
use crate::errors::BusError;
use crate::stream::{subject_matches, DurableLog, StoredEntry};
use crate::DLQ_SUBJECT;
use async_trait::async_trait;
use mesh_envelope::message::now_millis;
use mesh_envelope::Message;
use mesh_routing::validate_subject_tenant_access;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Thread-safe delivery counters.
#[derive(Debug, Default)]
pub struct BusCounters {
    /// Envelopes appended to the log.
    pub published: AtomicU64,
    /// Deliveries acknowledged by handlers.
    pub acked: AtomicU64,
    /// Redelivery attempts scheduled after handler failure or ack-wait
    /// expiry.
    pub redelivered: AtomicU64,
    /// Envelopes surfaced on the dead-letter subject.
    pub dead_lettered: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Envelopes appended to the log.
    pub published: u64,
    /// Deliveries acknowledged by handlers.
    pub acked: u64,
    /// Redelivery attempts.
    pub redelivered: u64,
    /// Dead-lettered envelopes.
    pub dead_lettered: u64,
}

/// A message that exhausted its retries.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// Subject the message was originally published on.
    pub subject: String,
    /// The undeliverable envelope.
    pub message: Message,
    /// Delivery attempts made before giving up.
    pub attempts: u32,
    /// Last failure reason.
    pub reason: String,
    /// When the message was dead-lettered, epoch milliseconds.
    pub at: u64,
}

struct ConsumerHandle {
    name: String,
    filter_subject: String,
    tx: mpsc::Sender<StoredEntry>,
}

struct Shared {
    config: BusConfig,
    stream: StreamConfig,
    log: DurableLog,
    seq: AtomicU64,
    connected: AtomicBool,
    closed: AtomicBool,
    reconnected: Notify,
    consumers: RwLock<Vec<ConsumerHandle>>,
    counters: BusCounters,
    dead_letters: RwLock<Vec<DeadLetter>>,
}

impl Shared {
    fn max_age_ms(&self) -> u64 {
        u64::try_from(self.stream.max_age.as_millis()).unwrap_or(u64::MAX)
    }

    /// Append an entry and fan it out to every matching consumer.
    /// Bounded consumer channels make this the backpressure point.
    async fn commit(&self, subject: &str, message: Message) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let size_bytes = serde_json::to_vec(&message).map(|b| b.len()).unwrap_or(0);
        let entry = StoredEntry {
            seq,
            subject: subject.to_string(),
            message,
            published_at: now_millis(),
            size_bytes,
        };
        self.log.append(entry.clone());
        self.counters.published.fetch_add(1, Ordering::Relaxed);
        self.log
            .prune(self.max_age_ms(), self.stream.max_bytes, entry.published_at);

        let targets: Vec<mpsc::Sender<StoredEntry>> = {
            let Ok(mut consumers) = self.consumers.write() else {
                return seq;
            };
            consumers.retain(|c| !c.tx.is_closed());
            consumers
                .iter()
                .filter(|c| subject_matches(&c.filter_subject, subject))
                .map(|c| c.tx.clone())
                .collect()
        };

        for tx in targets {
            // A dropped subscription mid-send is not an error; the entry
            // stays in the log and remains redeliverable.
            let _ = tx.send(entry.clone()).await;
        }

        seq
    }

    async fn dead_letter(&self, entry: StoredEntry, attempts: u32, reason: String) {
        error!(
            subject = %entry.subject,
            message_id = %entry.message.id,
            attempts,
            reason = %reason,
            "Message exhausted retries, routing to dead-letter subject"
        );

        let at = now_millis();
        if let Ok(mut dead) = self.dead_letters.write() {
            // The buffer honors the stream age cap too.
            let cutoff = at.saturating_sub(self.max_age_ms());
            dead.retain(|d| d.at >= cutoff);
            dead.push(DeadLetter {
                subject: entry.subject.clone(),
                message: entry.message.clone(),
                attempts,
                reason,
                at,
            });
        }
        self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);

        // Surface on the DLQ subject for operator consumers, unless the
        // exhaustion happened there already. Re-committing a DLQ entry
        // would hand every DLQ consumer its own dead letters back, and a
        // consumer that keeps failing would grow the log without bound.
        if entry.subject != DLQ_SUBJECT {
            self.commit(DLQ_SUBJECT, entry.message).await;
        }
    }
}

/// The in-process durable bus.
pub struct InMemoryDurableBus {
    shared: Arc<Shared>,
}

impl InMemoryDurableBus {
    /// Bus with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Bus with explicit connection configuration and a default stream.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        Self::with_stream(config, StreamConfig::default())
    }

    /// Bus backed by an explicit stream descriptor. The stream's age and
    /// byte caps are enforced on every append, oldest entries first;
    /// `replicas` is declarative and only meaningful to a networked
    /// deployment.
    #[must_use]
    pub fn with_stream(config: BusConfig, stream: StreamConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                stream,
                log: DurableLog::new(),
                seq: AtomicU64::new(0),
                connected: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                reconnected: Notify::new(),
                consumers: RwLock::new(Vec::new()),
                counters: BusCounters::default(),
                dead_letters: RwLock::new(Vec::new()),
            }),
        }
    }

    /// True while the transport link is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Relaxed)
    }

    /// Sever the transport link. Publishes fail fast until the automatic
    /// reconnect (governed by the configured backoff policy) restores it.
    pub fn drop_connection(&self) {
        if self.shared.closed.load(Ordering::Relaxed) {
            return;
        }
        self.shared.connected.store(false, Ordering::Relaxed);
        warn!("Bus connection lost, reconnecting with backoff");

        let shared = self.shared.clone();
        tokio::spawn(async move {
            let policy = shared.config.reconnect_policy();
            for attempt in 1..=policy.max_attempts {
                sleep(policy.delay_for(attempt)).await;
                if shared.closed.load(Ordering::Relaxed) {
                    return;
                }
                // The in-process link always reattaches; a networked
                // adapter would re-dial here and keep looping on failure.
                shared.connected.store(true, Ordering::Relaxed);
                shared.reconnected.notify_waiters();
                info!(attempt, "Bus connection restored");
                return;
            }
        });
    }

    /// Create a durable consumer from an explicit descriptor.
    ///
    /// # Errors
    ///
    /// - `BusError::Transport` when the bus is closed.
    /// - `BusError::Routing` when the filter subject fails the tenant
    ///   access check.
    pub async fn subscribe_with(
        &self,
        ctx: &PublishContext,
        config: ConsumerConfig,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, BusError> {
        if self.shared.closed.load(Ordering::Relaxed) {
            return Err(BusError::Transport("bus is closed".to_string()));
        }
        if let Some(tenant) = &ctx.tenant {
            validate_subject_tenant_access(tenant, &config.filter_subject)?;
        }

        let (tx, rx) = mpsc::channel(config.max_in_flight.max(1));
        let delivered = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(deliver_loop(
            self.shared.clone(),
            config.clone(),
            handler,
            rx,
            delivered.clone(),
        ));

        let registered_at = self.shared.seq.load(Ordering::Relaxed);
        {
            let Ok(mut consumers) = self.shared.consumers.write() else {
                task.abort();
                return Err(BusError::Transport("consumer registry poisoned".to_string()));
            };
            consumers.push(ConsumerHandle {
                name: config.name.clone(),
                filter_subject: config.filter_subject.clone(),
                tx: tx.clone(),
            });
        }

        // Backlog feed for replaying deliver policies. Entries published
        // while the backlog drains may be seen twice; at-least-once
        // delivery makes that the consumer's dedupe problem.
        let backlog_from = match config.deliver_policy {
            DeliverPolicy::New => None,
            DeliverPolicy::All => Some(0),
            DeliverPolicy::ByStartTime(from) => Some(from),
        };
        if let Some(from) = backlog_from {
            let filter = config.filter_subject.clone();
            let backlog = self.shared.log.select(|e| {
                e.seq <= registered_at
                    && e.published_at >= from
                    && subject_matches(&filter, &e.subject)
            });
            for entry in backlog {
                let _ = tx.send(entry).await;
            }
        }

        debug!(
            consumer = %config.name,
            filter = %config.filter_subject,
            "Durable consumer created"
        );

        Ok(Subscription::new(
            config.name,
            config.filter_subject,
            delivered,
            task,
        ))
    }

    /// Snapshot of the delivery counters.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        let c = &self.shared.counters;
        CounterSnapshot {
            published: c.published.load(Ordering::Relaxed),
            acked: c.acked.load(Ordering::Relaxed),
            redelivered: c.redelivered.load(Ordering::Relaxed),
            dead_lettered: c.dead_lettered.load(Ordering::Relaxed),
        }
    }

    /// Copy of the dead-letter buffer, oldest first.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.shared
            .dead_letters
            .read()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Number of entries in the durable log.
    #[must_use]
    pub fn log_len(&self) -> usize {
        self.shared.log.len()
    }

    fn default_consumer(&self, subject: &str) -> ConsumerConfig {
        let mut config = ConsumerConfig::live(
            format!("c-{}", Uuid::new_v4().simple()),
            subject.to_string(),
        );
        config.ack_wait = self.shared.config.ack_wait;
        config.max_in_flight = self.shared.config.max_in_flight;
        config
    }

    async fn await_connection(&self, budget: Duration) -> Result<(), BusError> {
        let deadline = Instant::now() + budget;
        while !self.shared.connected.load(Ordering::Relaxed) {
            let notified = self.shared.reconnected.notified();
            if self.shared.connected.load(Ordering::Relaxed) {
                break;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return Err(BusError::Timeout {
                    operation: "publish (waiting for reconnect)",
                    waited: budget,
                });
            };
            if timeout(remaining, notified).await.is_err() {
                return Err(BusError::Timeout {
                    operation: "publish (waiting for reconnect)",
                    waited: budget,
                });
            }
        }
        Ok(())
    }
}

impl Default for InMemoryDurableBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryDurableBus {
    async fn publish(
        &self,
        ctx: &PublishContext,
        subject: &str,
        msg: Message,
    ) -> Result<(), BusError> {
        if self.shared.closed.load(Ordering::Relaxed) {
            return Err(BusError::Transport("bus is closed".to_string()));
        }
        if let Some(tenant) = &ctx.tenant {
            validate_subject_tenant_access(tenant, subject)?;
        }
        if !msg.is_sealed() {
            return Err(BusError::Validation(format!(
                "message {} has no envelope hash; seal it before publishing",
                msg.id
            )));
        }

        if !self.shared.connected.load(Ordering::Relaxed) {
            match ctx.wait_budget {
                // Fail fast rather than blocking indefinitely.
                None => {
                    return Err(BusError::Transport(
                        "bus disconnected and no wait budget supplied".to_string(),
                    ))
                }
                Some(budget) => self.await_connection(budget).await?,
            }
        }

        let seq = self.shared.commit(subject, msg).await;
        debug!(subject = %subject, seq, "Message published");
        Ok(())
    }

    async fn subscribe(
        &self,
        ctx: &PublishContext,
        subject: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, BusError> {
        let config = self.default_consumer(subject);
        self.subscribe_with(ctx, config, handler).await
    }

    async fn replay(
        &self,
        ctx: &PublishContext,
        workflow_id: &str,
        from_millis: u64,
    ) -> Result<Vec<Message>, BusError> {
        if self.shared.closed.load(Ordering::Relaxed) {
            return Err(BusError::Transport("bus is closed".to_string()));
        }

        // Replay reads are served from the log, independent of live
        // traffic and of the connection state.
        let tenant = ctx.tenant.clone();
        let entries = self.shared.log.select(|entry| {
            if entry.published_at < from_millis {
                return false;
            }
            if !subject_names_workflow(&entry.subject, workflow_id) {
                return false;
            }
            match &tenant {
                Some(t) => validate_subject_tenant_access(t, &entry.subject).is_ok(),
                None => true,
            }
        });

        Ok(entries.into_iter().map(|e| e.message).collect())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.shared.closed.store(true, Ordering::Relaxed);
        self.shared.connected.store(false, Ordering::Relaxed);
        // Dropping the senders ends every consumer loop after it drains.
        if let Ok(mut consumers) = self.shared.consumers.write() {
            for consumer in consumers.drain(..) {
                debug!(consumer = %consumer.name, "Consumer detached on close");
            }
        }
        info!("Bus closed");
        Ok(())
    }
}

/// True when a subject addresses the given workflow, in either the
/// tenant-scoped (`tenant.workflows.wf.dir`) or legacy
/// (`workflows.wf.dir`) form.
fn subject_names_workflow(subject: &str, workflow_id: &str) -> bool {
    let segments: Vec<&str> = subject.split('.').collect();
    segments
        .windows(2)
        .take(2)
        .any(|w| w[0] == "workflows" && w[1] == workflow_id)
}

async fn deliver_loop(
    shared: Arc<Shared>,
    config: ConsumerConfig,
    handler: Arc<dyn MessageHandler>,
    mut rx: mpsc::Receiver<StoredEntry>,
    delivered: Arc<AtomicU64>,
) {
    while let Some(entry) = rx.recv().await {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = timeout(config.ack_wait, handler.handle(entry.message.clone())).await;

            let failure = match outcome {
                Ok(Ok(())) => {
                    delivered.fetch_add(1, Ordering::Relaxed);
                    shared.counters.acked.fetch_add(1, Ordering::Relaxed);
                    break;
                }
                Ok(Err(err)) => err.to_string(),
                Err(_) => format!("ack-wait {:?} exceeded", config.ack_wait),
            };

            if attempt >= config.retry.max_attempts {
                shared.dead_letter(entry.clone(), attempt, failure).await;
                break;
            }

            shared.counters.redelivered.fetch_add(1, Ordering::Relaxed);
            let delay = config.retry.delay_for(attempt);
            warn!(
                consumer = %config.name,
                subject = %entry.subject,
                message_id = %entry.message.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                reason = %failure,
                "Delivery failed, scheduling redelivery"
            );
            sleep(delay).await;
        }
    }
}
