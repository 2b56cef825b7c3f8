//! # Lifecycle Tests
//!
//! Whole node lifetimes on a real data directory: genesis adoption, restart
//! replay and log continuity, upgrade and downgrade boundaries, incident
//! refusal, and data-directory exclusivity.

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use tempfile::TempDir;

    use bn_01_membership::{load_roster, resolve};
    use bn_04_scratchpad::IncidentKind;
    use node_runtime::marker::{self, StartKind, MARKER_FILE};
    use node_runtime::{ConfigError, ConsensusSink, LoggingSink, NodeBootstrapCoordinator, NodeConfig};
    use shared_crypto::EventSigner;
    use shared_types::{GossipEvent, Member, MembershipView, NodeId};

    fn signer(id: u64) -> EventSigner {
        EventSigner::from_seed([id as u8; 32])
    }

    fn write_roster(path: &Path, ids: &[u64]) {
        let members: Vec<Member> = ids
            .iter()
            .map(|&id| Member {
                node_id: NodeId::new(id),
                address: format!("10.3.1.{id}:6120"),
                public_key: signer(id).public_key(),
                weight: 10,
            })
            .collect();
        let file = serde_json::json!({ "members": members });
        std::fs::write(path, serde_json::to_string_pretty(&file).expect("roster json"))
            .expect("write roster");
    }

    fn config_for(dir: &TempDir, roster_ids: &[u64]) -> NodeConfig {
        let roster_path = dir.path().join("roster.json");
        write_roster(&roster_path, roster_ids);
        let mut config = NodeConfig::default();
        config.node.node_id = NodeId::new(1);
        config.node.data_dir = dir.path().join("data");
        config.node.roster_path = roster_path;
        config
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

    /// A roster file that differs from the persisted view is adopted even on
    /// a plain restart, with the replaced view retained.
    #[test]
    fn test_roster_change_on_plain_restart_is_adopted() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("roster.json");
        write_roster(&path, &[1, 2, 3]);
        let loaded = load_roster(&path).expect("roster parses");
        assert_eq!(loaded.len(), 3);

        let persisted = MembershipView::new(
            [1u64, 2]
                .iter()
                .map(|&id| Member {
                    node_id: NodeId::new(id),
                    address: format!("10.3.1.{id}:6120"),
                    public_key: signer(id).public_key(),
                    weight: 10,
                })
                .collect(),
        )
        .expect("distinct ids");

        let resolution =
            resolve(NodeId::new(1), loaded, Some(persisted), false).expect("resolvable");
        assert!(resolution.changed);
        assert_eq!(resolution.current.len(), 3);
        assert_eq!(resolution.previous.map(|v| v.len()), Some(2));
    }

    /// Empty persisted state plus a four-node bootstrap roster: adopted as
    /// is, nothing reported changed.
    #[tokio::test]
    async fn test_genesis_adopts_four_node_roster_unchanged() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_for(&dir, &[1, 2, 3, 4]);

        let node = NodeBootstrapCoordinator::new(config)
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect("genesis bootstrap");

        assert_eq!(node.report.start, StartKind::Genesis);
        assert!(!node.report.membership_changed);
        assert_eq!(node.context.view.len(), 4);
        assert!(node.context.previous_view.is_none());
        node.shutdown().await;
    }

    /// Three lifetimes on one directory: what each lifetime stores, the
    /// next replays, and replayed events are refused as duplicates.
    #[tokio::test]
    async fn test_restart_continues_the_log_across_lifetimes() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_for(&dir, &[1, 2]);

        let first = NodeBootstrapCoordinator::new(config.clone())
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect("genesis bootstrap");
        let one = signed_event(2, b"x1");
        let two = signed_event(2, b"x2");
        assert!(first.registry.submit_event(NodeId::new(2), one.clone()).is_admitted());
        assert!(first.registry.submit_event(NodeId::new(2), two).is_admitted());
        first.shutdown().await;

        let sink = Arc::new(LoggingSink::new());
        let second = NodeBootstrapCoordinator::new(config.clone())
            .bootstrap(Arc::clone(&sink) as Arc<dyn ConsensusSink>)
            .await
            .expect("restart bootstrap");
        assert_eq!(second.report.start, StartKind::Restart);
        assert_eq!(second.report.replayed_events, 2);
        assert_eq!(sink.delivered(), 2);
        assert!(
            !second.registry.submit_event(NodeId::new(2), one).is_admitted(),
            "replayed event is a duplicate to gossip"
        );
        assert!(second
            .registry
            .submit_event(NodeId::new(2), signed_event(2, b"x3"))
            .is_admitted());
        second.shutdown().await;

        let third = NodeBootstrapCoordinator::new(config)
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect("second restart bootstrap");
        assert_eq!(third.report.replayed_events, 3);
        third.shutdown().await;
    }

    #[tokio::test]
    async fn test_newer_marker_version_refuses_to_start() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_for(&dir, &[1, 2]);
        let marker_path = config.node.data_dir.join(MARKER_FILE);

        let node = NodeBootstrapCoordinator::new(config.clone())
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect("genesis bootstrap");
        node.shutdown().await;

        let mut persisted = marker::load(&marker_path)
            .expect("load marker")
            .expect("marker written");
        persisted.version = "9.9.9".to_string();
        marker::store(&marker_path, &persisted).expect("rewrite marker");

        let err = NodeBootstrapCoordinator::new(config)
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect_err("downgrade refused");
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::DowngradeRefused { persisted, .. }) => {
                assert_eq!(persisted, "9.9.9");
            }
            other => panic!("expected DowngradeRefused, got {other:?}"),
        }
    }

    /// An older persisted version classifies the start as an upgrade, and a
    /// roster change at that boundary is adopted with the old view retained.
    #[tokio::test]
    async fn test_upgrade_boundary_adopts_new_roster() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_for(&dir, &[1, 2]);
        let marker_path = config.node.data_dir.join(MARKER_FILE);

        let node = NodeBootstrapCoordinator::new(config.clone())
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect("genesis bootstrap");
        node.shutdown().await;

        let mut persisted = marker::load(&marker_path)
            .expect("load marker")
            .expect("marker written");
        persisted.version = "0.0.1".to_string();
        marker::store(&marker_path, &persisted).expect("rewrite marker");
        write_roster(&config.node.roster_path, &[1, 2, 3]);

        let upgraded = NodeBootstrapCoordinator::new(config)
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect("upgrade bootstrap");
        assert_eq!(upgraded.report.start, StartKind::Upgrade);
        assert!(upgraded.report.membership_changed);
        assert_eq!(upgraded.context.view.len(), 3);
        assert_eq!(
            upgraded.context.previous_view.as_ref().map(|v| v.len()),
            Some(2)
        );
        upgraded.shutdown().await;
    }

    #[tokio::test]
    async fn test_incident_blocks_restart_until_overridden() {
        let dir = TempDir::new().expect("tempdir");
        let mut config = config_for(&dir, &[1, 2]);

        let node = NodeBootstrapCoordinator::new(config.clone())
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect("genesis bootstrap");
        assert!(node
            .registry
            .record_incident(5, IncidentKind::SelfDivergence)
            .expect("record incident"));
        assert!(
            !node
                .registry
                .record_incident(5, IncidentKind::SelfDivergence)
                .expect("repeat record"),
            "same (round, kind) records once"
        );
        node.shutdown().await;

        let err = NodeBootstrapCoordinator::new(config.clone())
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect_err("incident blocks restart");
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::UnsafeRestart { incident_round, .. }) => {
                assert_eq!(*incident_round, 5);
            }
            other => panic!("expected UnsafeRestart, got {other:?}"),
        }

        config.node.unsafe_restart_override = true;
        let overridden = NodeBootstrapCoordinator::new(config)
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect("override starts anyway");
        assert_eq!(overridden.report.incidents_on_file, 1);
        overridden.shutdown().await;
    }

    #[tokio::test]
    async fn test_data_dir_lock_frees_on_shutdown() {
        let dir = TempDir::new().expect("tempdir");
        let config = config_for(&dir, &[1, 2]);

        let holder = NodeBootstrapCoordinator::new(config.clone())
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect("first bootstrap");

        let err = NodeBootstrapCoordinator::new(config.clone())
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect_err("directory is held");
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::DataDirLocked { .. })
        ));

        holder.shutdown().await;
        let next = NodeBootstrapCoordinator::new(config)
            .bootstrap(Arc::new(LoggingSink::new()))
            .await
            .expect("lock released by shutdown");
        next.shutdown().await;
    }
}
