//! # Delivery Semantics
//!
//! At-least-once delivery end to end: redelivery with backoff after
//! handler failure, dead-lettering on retry exhaustion, workflow replay
//! from a time boundary, duplicate suppression via the dedupe store, and
//! publish behavior across disconnection.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use mesh_bus::{
        handler_fn, BusError, ConsumerConfig, DedupingHandler, DeliverPolicy, HandlerError,
        InMemoryDurableBus, MessageBus, MessageHandler, PublishContext, RetryPolicy,
        TimeBoundedDedupeCache, DLQ_SUBJECT,
    };
    use mesh_envelope::{CanonicalCodec, Message, MessageType};
    use mesh_routing::{workflow_in, workflow_out, TenantContext};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    fn sealed(from: &str, payload: serde_json::Value) -> Message {
        CanonicalCodec::new()
            .seal(Message::new(from, "sink", MessageType::Event, payload))
            .unwrap()
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_delay: Duration::from_millis(20),
            max_attempts,
            jitter: 0.0,
        }
    }

    fn consumer(name: &str, filter: &str, max_attempts: u32) -> ConsumerConfig {
        let mut config = ConsumerConfig::live(name, filter);
        config.ack_wait = Duration::from_millis(500);
        config.retry = fast_retry(max_attempts);
        config
    }

    async fn settle() {
        sleep(Duration::from_millis(300)).await;
    }

    /// Operator-style consumer that tallies everything surfaced on the
    /// dead-letter subject.
    struct DlqAudit {
        seen: Arc<AtomicU64>,
    }

    #[async_trait]
    impl MessageHandler for DlqAudit {
        async fn handle(&self, _msg: Message) -> Result<(), HandlerError> {
            self.seen.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_handler_redelivered_until_success() {
        let bus = Arc::new(InMemoryDurableBus::new());
        let ctx = PublishContext::default();
        let subject = workflow_in("acme", "wf-1");

        let attempts = Arc::new(AtomicU64::new(0));
        let effects = Arc::new(AtomicU64::new(0));
        let a = attempts.clone();
        let e = effects.clone();
        let _sub = bus
            .subscribe_with(
                &ctx,
                consumer("flaky", &subject, 5),
                handler_fn(move |_msg| {
                    let attempts = a.clone();
                    let effects = e.clone();
                    async move {
                        // Fail the first two deliveries, then succeed.
                        if attempts.fetch_add(1, Ordering::Relaxed) < 2 {
                            Err(mesh_bus::HandlerError::Failed("not yet".to_string()))
                        } else {
                            effects.fetch_add(1, Ordering::Relaxed);
                            Ok(())
                        }
                    }
                }),
            )
            .await
            .unwrap();

        bus.publish(&ctx, &subject, sealed("a", json!({"n": 1})))
            .await
            .unwrap();
        settle().await;

        assert_eq!(attempts.load(Ordering::Relaxed), 3);
        assert_eq!(effects.load(Ordering::Relaxed), 1);

        let counters = bus.counters();
        assert_eq!(counters.acked, 1);
        assert_eq!(counters.redelivered, 2);
        assert_eq!(counters.dead_lettered, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_reach_dead_letter_subject() {
        let bus = Arc::new(InMemoryDurableBus::new());
        let ctx = PublishContext::default();
        let subject = workflow_in("acme", "wf-doomed");

        let _sub = bus
            .subscribe_with(
                &ctx,
                consumer("always-fails", &subject, 3),
                handler_fn(|_msg| async {
                    Err(mesh_bus::HandlerError::Nak("cannot process".to_string()))
                }),
            )
            .await
            .unwrap();

        // An operator consumer watching the DLQ subject.
        let dlq_seen = Arc::new(AtomicU64::new(0));
        let _dlq_sub = bus
            .subscribe(
                &ctx,
                DLQ_SUBJECT,
                Arc::new(DlqAudit {
                    seen: dlq_seen.clone(),
                }),
            )
            .await
            .unwrap();

        let msg = sealed("a", json!({"doomed": true}));
        let msg_id = msg.id;
        bus.publish(&ctx, &subject, msg).await.unwrap();
        settle().await;

        let dead = bus.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 3);
        assert_eq!(dead[0].subject, subject);
        assert_eq!(dead[0].message.id, msg_id);
        assert!(dead[0].reason.contains("cannot process"));

        assert_eq!(dlq_seen.load(Ordering::Relaxed), 1);
        assert_eq!(bus.counters().dead_lettered, 1);
    }

    #[tokio::test]
    async fn test_duplicate_redelivery_suppressed_by_dedupe_store() {
        let bus = Arc::new(InMemoryDurableBus::new());
        let ctx = PublishContext::default();
        let subject = workflow_in("acme", "wf-dup");

        let effects = Arc::new(AtomicU64::new(0));
        let e = effects.clone();
        let inner = handler_fn(move |_msg| {
            let effects = e.clone();
            async move {
                effects.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        });
        let deduping = Arc::new(DedupingHandler::new(
            inner,
            Arc::new(TimeBoundedDedupeCache::new()),
        ));

        let _sub = bus.subscribe(&ctx, &subject, deduping).await.unwrap();

        // The same sealed envelope published twice, as a retrying
        // producer would after a lost acknowledgement.
        let msg = sealed("a", json!({"n": 7}));
        bus.publish(&ctx, &subject, msg.clone()).await.unwrap();
        bus.publish(&ctx, &subject, msg).await.unwrap();
        settle().await;

        assert_eq!(effects.load(Ordering::Relaxed), 1);
        // Both deliveries were acknowledged; suppression is not failure.
        assert_eq!(bus.counters().acked, 2);
    }

    #[tokio::test]
    async fn test_replay_returns_workflow_messages_in_publish_order() {
        let bus = Arc::new(InMemoryDurableBus::new());
        let tenant = TenantContext::new("acme", "Acme Corp");
        let ctx = PublishContext::for_tenant(tenant);

        for n in 0..5 {
            bus.publish(
                &ctx,
                &workflow_in("acme", "wf-replay"),
                sealed("step", json!({"n": n})),
            )
            .await
            .unwrap();
        }
        // Traffic for another workflow must not appear in the replay.
        bus.publish(
            &ctx,
            &workflow_out("acme", "wf-other"),
            sealed("noise", json!({})),
        )
        .await
        .unwrap();

        let replayed = bus.replay(&ctx, "wf-replay", 0).await.unwrap();
        assert_eq!(replayed.len(), 5);
        for (n, msg) in replayed.iter().enumerate() {
            assert_eq!(msg.payload["n"], json!(n));
        }
    }

    #[tokio::test]
    async fn test_replay_respects_time_boundary() {
        let bus = Arc::new(InMemoryDurableBus::new());
        let ctx = PublishContext::default();
        let subject = workflow_in("acme", "wf-window");

        bus.publish(&ctx, &subject, sealed("early", json!({})))
            .await
            .unwrap();
        sleep(Duration::from_millis(20)).await;
        let boundary = mesh_envelope::message::now_millis();
        sleep(Duration::from_millis(20)).await;
        bus.publish(&ctx, &subject, sealed("late", json!({})))
            .await
            .unwrap();

        let replayed = bus.replay(&ctx, "wf-window", boundary).await.unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].from, "late");
    }

    #[tokio::test]
    async fn test_replay_safe_context_is_carried_not_enforced() {
        // Replay suppression is the consumer's duty; the adapter serves
        // the read either way.
        let bus = Arc::new(InMemoryDurableBus::new());
        let ctx = PublishContext::default();
        bus.publish(
            &ctx,
            &workflow_in("acme", "wf-rs"),
            sealed("step", json!({})),
        )
        .await
        .unwrap();

        let replay_ctx = PublishContext::default().replay_safe();
        assert!(replay_ctx.replay_safe);
        let replayed = bus.replay(&replay_ctx, "wf-rs", 0).await.unwrap();
        assert_eq!(replayed.len(), 1);
    }

    #[tokio::test]
    async fn test_disconnected_publish_fails_fast_without_budget() {
        let bus = InMemoryDurableBus::new();
        bus.drop_connection();

        let result = bus
            .publish(
                &PublishContext::default(),
                &workflow_in("acme", "wf-1"),
                sealed("a", json!({})),
            )
            .await;

        assert!(matches!(result, Err(BusError::Transport(_))));
    }

    #[tokio::test]
    async fn test_disconnected_publish_waits_within_budget() {
        let mut config = mesh_bus::BusConfig::default();
        config.reconnect_wait = Duration::from_millis(10);
        let bus = InMemoryDurableBus::with_config(config);
        bus.drop_connection();

        let ctx = PublishContext::default().with_wait_budget(Duration::from_secs(2));
        bus.publish(&ctx, &workflow_in("acme", "wf-1"), sealed("a", json!({})))
            .await
            .unwrap();

        assert!(bus.is_connected());
        assert_eq!(bus.log_len(), 1);
    }

    #[tokio::test]
    async fn test_unsealed_message_rejected_at_publish() {
        let bus = InMemoryDurableBus::new();
        let unsealed = Message::new("a", "b", MessageType::Event, json!({}));

        let result = bus
            .publish(
                &PublishContext::default(),
                &workflow_in("acme", "wf-1"),
                unsealed,
            )
            .await;

        assert!(matches!(result, Err(BusError::Validation(_))));
    }

    #[tokio::test]
    async fn test_deliver_policy_all_feeds_backlog() {
        let bus = Arc::new(InMemoryDurableBus::new());
        let ctx = PublishContext::default();
        let subject = workflow_in("acme", "wf-backlog");

        bus.publish(&ctx, &subject, sealed("before", json!({})))
            .await
            .unwrap();

        let seen = Arc::new(AtomicU64::new(0));
        let s = seen.clone();
        let mut config = consumer("catch-up", &subject, 3);
        config.deliver_policy = DeliverPolicy::All;
        let _sub = bus
            .subscribe_with(
                &ctx,
                config,
                handler_fn(move |_msg| {
                    let seen = s.clone();
                    async move {
                        seen.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }
                }),
            )
            .await
            .unwrap();

        bus.publish(&ctx, &subject, sealed("after", json!({})))
            .await
            .unwrap();
        settle().await;

        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_all_delivered() {
        let bus = Arc::new(InMemoryDurableBus::new());
        let ctx = PublishContext::default();
        let subject = workflow_in("acme", "wf-par");

        let seen = Arc::new(AtomicU64::new(0));
        let s = seen.clone();
        let _sub = bus
            .subscribe(
                &ctx,
                &subject,
                handler_fn(move |_msg| {
                    let seen = s.clone();
                    async move {
                        seen.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }
                }),
            )
            .await
            .unwrap();

        let publishers = (0..4).map(|p| {
            let bus = bus.clone();
            let ctx = ctx.clone();
            let subject = subject.clone();
            async move {
                for n in 0..25 {
                    bus.publish(&ctx, &subject, sealed(&format!("pub-{p}"), json!({"n": n})))
                        .await
                        .unwrap();
                }
            }
        });
        futures::future::join_all(publishers).await;
        settle().await;

        assert_eq!(seen.load(Ordering::Relaxed), 100);
        assert_eq!(bus.counters().acked, 100);
    }

    #[tokio::test]
    async fn test_failing_dlq_consumer_leaves_dead_letter_count_stable() {
        let bus = Arc::new(InMemoryDurableBus::new());
        let ctx = PublishContext::default();

        let _sub = bus
            .subscribe_with(
                &ctx,
                consumer("dlq-operator", DLQ_SUBJECT, 2),
                handler_fn(|_msg| async { Err(HandlerError::Nak("operator down".to_string())) }),
            )
            .await
            .unwrap();

        bus.publish(&ctx, DLQ_SUBJECT, sealed("a", json!({"bad": true})))
            .await
            .unwrap();
        settle().await;

        // Exhaustion on the DLQ itself must not feed the DLQ again.
        assert_eq!(bus.counters().dead_lettered, 1);
        assert_eq!(bus.dead_letters().len(), 1);
        assert_eq!(bus.log_len(), 1);
    }

    #[tokio::test]
    async fn test_closed_bus_rejects_operations() {
        let bus = InMemoryDurableBus::new();
        bus.close().await.unwrap();

        let publish = bus
            .publish(
                &PublishContext::default(),
                &workflow_in("acme", "wf-1"),
                sealed("a", json!({})),
            )
            .await;
        assert!(matches!(publish, Err(BusError::Transport(_))));

        let subscribe = bus
            .subscribe(
                &PublishContext::default(),
                &workflow_in("acme", "wf-1"),
                handler_fn(|_msg| async { Ok(()) }),
            )
            .await;
        assert!(matches!(subscribe, Err(BusError::Transport(_))));
    }
}
