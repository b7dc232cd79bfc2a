//! Bus interface: publish/subscribe/replay contracts and the handler
//! seam consumers implement.

use crate::errors::BusError;
use async_trait::async_trait;
use mesh_envelope::Message;
use mesh_routing::TenantContext;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Per-call context for bus operations.
#[derive(Debug, Clone, Default)]
pub struct PublishContext {
    /// Tenant on whose behalf the call executes. When present, subjects
    /// are access-checked against it before reaching the broker.
    pub tenant: Option<TenantContext>,

    /// How long a publish may wait for reconnection while the transport
    /// is down. Absent means fail fast.
    pub wait_budget: Option<Duration>,

    /// Marks this context as replay-safe: consumers seeing this flag
    /// must suppress external side effects. Honoring it is the caller's
    /// duty; the adapter serves replay reads regardless.
    pub replay_safe: bool,
}

impl PublishContext {
    /// Context scoped to a tenant.
    #[must_use]
    pub fn for_tenant(tenant: TenantContext) -> Self {
        Self {
            tenant: Some(tenant),
            ..Self::default()
        }
    }

    /// Allow the publish to wait for reconnection up to `budget`.
    #[must_use]
    pub fn with_wait_budget(mut self, budget: Duration) -> Self {
        self.wait_budget = Some(budget);
        self
    }

    /// Mark the context replay-safe.
    #[must_use]
    pub fn replay_safe(mut self) -> Self {
        self.replay_safe = true;
        self
    }
}

/// Why a handler could not process a delivery. Both variants cause
/// redelivery under the consumer's retry policy.
#[derive(Debug, Error, Clone)]
pub enum HandlerError {
    /// The handler failed while processing.
    #[error("Handler failed: {0}")]
    Failed(String),

    /// The handler explicitly refused the delivery.
    #[error("Negative acknowledgement: {0}")]
    Nak(String),
}

/// Consumer-side processing seam. One invocation per delivery; returning
/// an error (or exceeding the consumer's ack-wait) triggers redelivery.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one delivered message.
    async fn handle(&self, msg: Message) -> Result<(), HandlerError>;
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, msg: Message) -> Result<(), HandlerError> {
        (self.f)(msg).await
    }
}

/// Wrap an async closure as a [`MessageHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Handle to a named durable consumer.
///
/// Dropping the subscription stops delivery; unacknowledged messages
/// remain in the durable log and stay redeliverable to a successor
/// consumer.
pub struct Subscription {
    name: String,
    filter_subject: String,
    delivered: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(
        name: String,
        filter_subject: String,
        delivered: Arc<AtomicU64>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            filter_subject,
            delivered,
            task,
        }
    }

    /// Durable consumer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The subject filter this consumer is bound to.
    #[must_use]
    pub fn filter_subject(&self) -> &str {
        &self.filter_subject
    }

    /// Successfully acknowledged deliveries so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Broker seam. Alternate brokers substitute via dependency injection
/// without touching call sites.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a sealed envelope durably on a subject.
    async fn publish(
        &self,
        ctx: &PublishContext,
        subject: &str,
        msg: Message,
    ) -> Result<(), BusError>;

    /// Create a named durable consumer bound to a subject filter.
    async fn subscribe(
        &self,
        ctx: &PublishContext,
        subject: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Subscription, BusError>;

    /// Messages for a logical workflow in original publish order,
    /// starting from an epoch-millisecond time boundary.
    async fn replay(
        &self,
        ctx: &PublishContext,
        workflow_id: &str,
        from_millis: u64,
    ) -> Result<Vec<Message>, BusError>;

    /// Shut the adapter down. Subsequent publishes fail with a
    /// transport error.
    async fn close(&self) -> Result<(), BusError>;
}
