//! # Tenant Isolation
//!
//! Routing boundaries between tenants: cross-tenant access denial at
//! both the validation layer and the bus adapter, order-preserving
//! subject filtering, and migration helpers for legacy subjects.

#[cfg(test)]
mod tests {
    use mesh_bus::{handler_fn, BusError, InMemoryDurableBus, MessageBus, PublishContext};
    use mesh_envelope::{CanonicalCodec, Message, MessageType};
    use mesh_routing::{
        agent_in, ensure_tenant_prefix, filter_subjects_by_tenant, strip_tenant_prefix,
        validate_subject_tenant_access, workflow_in, RoutingError, TenantContext,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn sealed(from: &str, to: &str) -> Message {
        CanonicalCodec::new()
            .seal(Message::new(
                from,
                to,
                MessageType::Event,
                json!({"ok": true}),
            ))
            .unwrap()
    }

    #[test]
    fn test_cross_tenant_access_denied() {
        let acme = TenantContext::new("acme", "Acme Corp");
        let subject = workflow_in("globex", "wf-1");

        match validate_subject_tenant_access(&acme, &subject) {
            Err(RoutingError::CrossTenantAccessDenied {
                subject_tenant,
                caller_tenant,
            }) => {
                assert_eq!(subject_tenant, "globex");
                assert_eq!(caller_tenant, "acme");
            }
            other => panic!("expected denial, got {other:?}"),
        }
    }

    #[test]
    fn test_same_tenant_access_allowed() {
        let acme = TenantContext::new("acme", "Acme Corp");
        assert!(validate_subject_tenant_access(&acme, &workflow_in("acme", "wf-1")).is_ok());
        assert!(validate_subject_tenant_access(&acme, &agent_in("acme", "planner")).is_ok());
    }

    #[test]
    fn test_filter_preserves_order_and_drops_silently() {
        let acme = TenantContext::new("acme", "Acme Corp");
        let subjects = vec![
            workflow_in("acme", "wf-1"),
            workflow_in("globex", "wf-2"),
            agent_in("acme", "planner"),
            agent_in("initech", "reviewer"),
            workflow_in("acme", "wf-3"),
        ];

        let visible = filter_subjects_by_tenant(&acme, &subjects);
        assert_eq!(
            visible,
            vec![
                workflow_in("acme", "wf-1"),
                agent_in("acme", "planner"),
                workflow_in("acme", "wf-3"),
            ]
        );
    }

    #[test]
    fn test_legacy_subject_migration_is_idempotent() {
        let migrated = ensure_tenant_prefix("acme", "workflows.wf-1.in");
        assert_eq!(migrated, "acme.workflows.wf-1.in");

        // A second pass must not double-prefix.
        assert_eq!(ensure_tenant_prefix("acme", &migrated), migrated);

        assert_eq!(strip_tenant_prefix(&migrated), "workflows.wf-1.in");
    }

    #[tokio::test]
    async fn test_bus_rejects_cross_tenant_publish() {
        let bus = InMemoryDurableBus::new();
        let ctx = PublishContext::for_tenant(TenantContext::new("acme", "Acme Corp"));

        let result = bus
            .publish(&ctx, &workflow_in("globex", "wf-1"), sealed("a", "b"))
            .await;

        assert!(matches!(
            result,
            Err(BusError::Routing(RoutingError::CrossTenantAccessDenied { .. }))
        ));
        assert_eq!(bus.log_len(), 0);
    }

    #[tokio::test]
    async fn test_bus_rejects_cross_tenant_subscribe() {
        let bus = InMemoryDurableBus::new();
        let ctx = PublishContext::for_tenant(TenantContext::new("acme", "Acme Corp"));

        let result = bus
            .subscribe(
                &ctx,
                &workflow_in("globex", "wf-1"),
                handler_fn(|_msg| async { Ok(()) }),
            )
            .await;

        assert!(matches!(result, Err(BusError::Routing(_))));
    }

    #[tokio::test]
    async fn test_tenant_scoped_delivery_does_not_leak() {
        let bus = Arc::new(InMemoryDurableBus::new());
        let acme = PublishContext::for_tenant(TenantContext::new("acme", "Acme Corp"));
        let globex = PublishContext::for_tenant(TenantContext::new("globex", "Globex"));

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = bus
            .subscribe(
                &acme,
                &workflow_in("acme", "wf-1"),
                handler_fn(move |msg: Message| {
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send(msg);
                        Ok(())
                    }
                }),
            )
            .await
            .unwrap();

        bus.publish(&acme, &workflow_in("acme", "wf-1"), sealed("a", "b"))
            .await
            .unwrap();
        bus.publish(&globex, &workflow_in("globex", "wf-1"), sealed("x", "y"))
            .await
            .unwrap();

        let delivered = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.from, "a");

        // Nothing else arrives for the acme consumer.
        let extra =
            tokio::time::timeout(std::time::Duration::from_millis(100), rx.recv()).await;
        assert!(extra.is_err());
    }
}
