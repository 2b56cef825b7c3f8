//! # Admission Flow Tests
//!
//! The gate, the duplicate index, and the intake stage working as one front
//! door. Each test builds a real pipeline stage so the backpressure paths
//! are the ones gossip would actually hit.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Notify;

    use bn_02_intake::{AdmissionGate, Ed25519Verifier, EventIntake, IntakeConfig, PerPeerGate};
    use shared_crypto::EventSigner;
    use shared_pipeline::{worker_fn, HealthConfig, Pipeline};
    use shared_types::{
        AdmissionResult, AdmittedEvent, BackpressureCause, GossipEvent, InvalidCause, Member,
        MembershipView, NodeId, RejectReason,
    };

    fn signer(id: u64) -> EventSigner {
        EventSigner::from_seed([id as u8; 32])
    }

    fn view(ids: &[u64]) -> MembershipView {
        MembershipView::new(
            ids.iter()
                .map(|&id| Member {
                    node_id: NodeId::new(id),
                    address: format!("10.3.0.{id}:6120"),
                    public_key: signer(id).public_key(),
                    weight: 10,
                })
                .collect(),
        )
        .expect("distinct ids")
    }

    fn signed_event(creator: u64, payload: &[u8]) -> GossipEvent {
        let mut event = GossipEvent {
            creator: NodeId::new(creator),
            self_parent: None,
            other_parent: None,
            birth_round: 1,
            created_at: 1_700_000_000_000,
            payload: payload.to_vec(),
            signature: [0u8; 64],
        };
        event.signature = signer(creator).sign(&event.id());
        event
    }

    /// Charge to the bound, get refused, release once, charge again.
    #[test]
    fn test_gate_admits_to_limit_and_reopens_on_release() {
        let gate = PerPeerGate::new(&view(&[1, 2]), 2);
        let peer = NodeId::new(2);

        assert!(gate.try_admit(peer));
        assert!(gate.try_admit(peer));
        assert!(!gate.try_admit(peer), "third charge exceeds the limit");

        gate.release(peer);
        assert!(gate.try_admit(peer), "released slot is chargeable again");
        assert_eq!(gate.admitted(peer), 2);
    }

    #[tokio::test]
    async fn test_peer_limit_lifts_when_consensus_orders_the_event() {
        let mut pipeline = Pipeline::new(HealthConfig::default());
        let members = view(&[1, 2]);
        let config = IntakeConfig {
            per_peer_limit: 1,
            ..IntakeConfig::default()
        };
        let stage = pipeline.add_stage(
            "durable",
            8,
            worker_fn(|_ev: AdmittedEvent| async move {}),
        );
        let gate: Arc<dyn AdmissionGate> =
            Arc::new(PerPeerGate::new(&members, config.per_peer_limit));
        let intake = EventIntake::new(
            members,
            gate,
            Arc::new(Ed25519Verifier),
            stage,
            &config,
        );

        let first = signed_event(2, b"a");
        let second = signed_event(2, b"b");
        assert!(intake.submit(NodeId::new(2), first.clone()).is_admitted());
        assert_eq!(
            intake.submit(NodeId::new(2), second.clone()),
            AdmissionResult::Rejected(RejectReason::Backpressure(
                BackpressureCause::PeerAtLimit
            ))
        );

        // The budget is per forwarding peer: another member relaying the
        // same creator's event has its own slots.
        let relayed = signed_event(2, b"c");
        assert!(intake.submit(NodeId::new(1), relayed).is_admitted());

        // Ordering the first event returns peer 2's slot.
        intake.on_consensus_reached(first.id(), 1);
        assert!(intake.submit(NodeId::new(2), second).is_admitted());
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_stale_event_returns_the_slot_but_stays_known() {
        let mut pipeline = Pipeline::new(HealthConfig::default());
        let members = view(&[1, 2]);
        let config = IntakeConfig {
            per_peer_limit: 1,
            ..IntakeConfig::default()
        };
        let stage = pipeline.add_stage(
            "durable",
            8,
            worker_fn(|_ev: AdmittedEvent| async move {}),
        );
        let gate: Arc<dyn AdmissionGate> =
            Arc::new(PerPeerGate::new(&members, config.per_peer_limit));
        let intake = EventIntake::new(
            members,
            gate,
            Arc::new(Ed25519Verifier),
            stage,
            &config,
        );

        let stale = signed_event(2, b"old");
        assert!(intake.submit(NodeId::new(2), stale.clone()).is_admitted());
        intake.on_stale(stale.id());
        assert_eq!(intake.in_flight(), 0);

        // The slot is free again, but the stale event itself stays refused.
        assert_eq!(
            intake.submit(NodeId::new(2), stale),
            AdmissionResult::Rejected(RejectReason::Invalid(InvalidCause::DuplicateEvent))
        );
        assert!(intake.submit(NodeId::new(2), signed_event(2, b"new")).is_admitted());
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_never_reaches_the_gate() {
        let mut pipeline = Pipeline::new(HealthConfig::default());
        let members = view(&[1, 2]);
        let config = IntakeConfig::default();
        let stage = pipeline.add_stage(
            "durable",
            8,
            worker_fn(|_ev: AdmittedEvent| async move {}),
        );
        let gate = Arc::new(PerPeerGate::new(&members, config.per_peer_limit));
        let intake = EventIntake::new(
            members,
            Arc::clone(&gate) as Arc<dyn AdmissionGate>,
            Arc::new(Ed25519Verifier),
            stage,
            &config,
        );

        let event = signed_event(2, b"once");
        assert!(intake.submit(NodeId::new(2), event.clone()).is_admitted());
        assert_eq!(
            intake.submit(NodeId::new(2), event),
            AdmissionResult::Rejected(RejectReason::Invalid(InvalidCause::DuplicateEvent))
        );

        assert_eq!(gate.admitted(NodeId::new(2)), 1, "duplicate costs no slot");
        assert_eq!(intake.in_flight(), 1);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_queue_full_bounce_refunds_the_peer_budget() {
        let mut pipeline = Pipeline::new(HealthConfig::default());
        let hold = Arc::new(Notify::new());
        let held = Arc::clone(&hold);
        let stage = pipeline.add_stage(
            "durable",
            1,
            worker_fn(move |_ev: AdmittedEvent| {
                let held = Arc::clone(&held);
                async move {
                    held.notified().await;
                }
            }),
        );
        let members = view(&[1, 2]);
        let config = IntakeConfig::default();
        let gate = Arc::new(PerPeerGate::new(&members, config.per_peer_limit));
        let intake = EventIntake::new(
            members,
            Arc::clone(&gate) as Arc<dyn AdmissionGate>,
            Arc::new(Ed25519Verifier),
            stage,
            &config,
        );
        let peer = NodeId::new(1);

        // Worker parks on the first event, the second fills the queue.
        assert!(intake.submit(peer, signed_event(2, b"a")).is_admitted());
        tokio::task::yield_now().await;
        assert!(intake.submit(peer, signed_event(2, b"b")).is_admitted());
        assert_eq!(
            intake.submit(peer, signed_event(2, b"c")),
            AdmissionResult::Rejected(RejectReason::Backpressure(
                BackpressureCause::IntakeQueueFull
            ))
        );

        assert_eq!(gate.admitted(peer), 2, "bounced charge was refunded");
        assert_eq!(intake.in_flight(), 2);

        // Unwedge so everything queued drains, then retry the bounce.
        hold.notify_waiters();
        hold.notify_one();
        let retry = signed_event(2, b"c");
        let outcome = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match intake.submit(peer, retry.clone()) {
                    AdmissionResult::Admitted { .. } => break,
                    AdmissionResult::Rejected(RejectReason::Backpressure(_)) => {
                        tokio::task::yield_now().await;
                    }
                    other => panic!("bounced event must stay retryable, got {other:?}"),
                }
            }
        })
        .await;
        assert!(outcome.is_ok(), "retry admitted once the queue moved");

        hold.notify_one();
        pipeline.shutdown().await;
    }
}
