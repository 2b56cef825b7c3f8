//! # Durability Tests
//!
//! The store run against real directories: torn tails cut back to the last
//! whole record, crash points replayed from copied directory snapshots,
//! pruning held back by the snapshot floor, and the gap policy deciding
//! whether a missing segment is fatal.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use rand::RngCore;
    use tempfile::TempDir;

    use bn_03_event_store::{EventStore, GapPolicy, StoreConfig, StoreError};
    use shared_types::{AdmittedEvent, EventId, GossipEvent, NodeId, Round};

    fn event(creator: u64, round: Round, payload: Vec<u8>) -> AdmittedEvent {
        AdmittedEvent::new(GossipEvent {
            creator: NodeId::new(creator),
            self_parent: None,
            other_parent: None,
            birth_round: round,
            created_at: 1_700_000_000_000 + round,
            payload,
            signature: [0u8; 64],
        })
    }

    /// Flat copy of a segment directory, simulating what a crash leaves.
    fn copy_dir(src: &Path, dst: &Path) {
        fs::create_dir_all(dst).expect("snapshot dir");
        for entry in fs::read_dir(src).expect("read dir") {
            let entry = entry.expect("dir entry");
            fs::copy(entry.path(), dst.join(entry.file_name())).expect("copy segment");
        }
    }

    /// Two sealed segments plus a torn third: the partial record is cut,
    /// counted, and everything before it survives.
    #[test]
    fn test_truncated_tail_record_is_discarded_and_counted() {
        let dir = TempDir::new().expect("tempdir");
        let (mut store, _) = EventStore::open(dir.path(), StoreConfig::default()).expect("open");

        store.append(&event(1, 1, b"a".to_vec())).expect("append");
        store.roll().expect("roll");
        store.append(&event(2, 2, b"b".to_vec())).expect("append");
        store.roll().expect("roll");

        let tail_path = dir.path().join("segment-0000000002.open");
        store.append(&event(1, 3, b"c".to_vec())).expect("append");
        let intact_len = fs::metadata(&tail_path).expect("tail meta").len();
        store.append(&event(2, 3, b"dddd".to_vec())).expect("append");
        let full_len = fs::metadata(&tail_path).expect("tail meta").len();
        drop(store);

        // Cut three bytes into the last record's frame.
        let torn_len = full_len - 3;
        let file = fs::OpenOptions::new()
            .write(true)
            .open(&tail_path)
            .expect("open tail");
        file.set_len(torn_len).expect("truncate");
        drop(file);

        let (store, report) = EventStore::open(dir.path(), StoreConfig::default()).expect("reopen");
        assert_eq!(report.segments, 3);
        assert_eq!(report.events_recovered, 3);
        assert_eq!(report.discarded_records, 1);
        assert_eq!(report.truncated_bytes, torn_len - intact_len);
        assert!(report.sealed_tail);
        assert!(report.repaired());

        let payloads: Vec<Vec<u8>> = store
            .replay()
            .map(|r| r.expect("replay record").event.payload)
            .collect();
        assert_eq!(payloads, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    /// A crash between any two appends loses nothing flushed and surfaces
    /// nothing partial.
    #[test]
    fn test_recovery_sees_exactly_the_flushed_prefix() {
        let dir = TempDir::new().expect("tempdir");
        let (mut store, _) = EventStore::open(dir.path(), StoreConfig::default()).expect("open");

        let mut expected: Vec<EventId> = Vec::new();
        let mut snapshots: Vec<(TempDir, Vec<EventId>)> = Vec::new();
        for k in 1..=5u64 {
            let ev = event(1 + k % 2, k, format!("payload {k}").into_bytes());
            store.append(&ev).expect("append");
            expected.push(ev.id);

            let snap = TempDir::new().expect("snapshot tempdir");
            copy_dir(dir.path(), snap.path());
            snapshots.push((snap, expected.clone()));
        }
        drop(store);

        for (snap, ids) in snapshots {
            let (recovered, report) =
                EventStore::open(snap.path(), StoreConfig::default()).expect("recover snapshot");
            assert_eq!(report.events_recovered, ids.len() as u64);
            assert_eq!(report.truncated_bytes, 0);
            assert_eq!(report.discarded_records, 0);

            let seen: Vec<EventId> = recovered
                .replay()
                .map(|r| r.expect("replay record").id)
                .collect();
            assert_eq!(seen, ids, "replay is exactly the flushed prefix");
        }
    }

    /// Payloads of every size come back byte-identical and in append order,
    /// across segment rolls forced by a narrow round span.
    #[test]
    fn test_replay_returns_payloads_byte_identical_in_order() {
        let dir = TempDir::new().expect("tempdir");
        let config = StoreConfig {
            segment_max_round_span: 2,
            ..StoreConfig::default()
        };
        let (mut store, _) = EventStore::open(dir.path(), config.clone()).expect("open");

        let mut rng = rand::thread_rng();
        let sizes = [0usize, 1, 17, 256, 4096];
        let mut expected: Vec<(EventId, Vec<u8>)> = Vec::new();
        for round in 1..=10u64 {
            let mut payload = vec![0u8; sizes[(round as usize - 1) % sizes.len()]];
            rng.fill_bytes(&mut payload);
            let ev = event(1 + round % 2, round, payload.clone());
            store.append(&ev).expect("append");
            expected.push((ev.id, payload));
        }
        assert!(store.segment_count() > 1, "narrow span forces rolls");
        drop(store);

        let (store, report) = EventStore::open(dir.path(), config).expect("reopen");
        assert_eq!(report.events_recovered, 10);
        let seen: Vec<(EventId, Vec<u8>)> = store
            .replay()
            .map(|r| {
                let ev = r.expect("replay record");
                (ev.id, ev.event.payload)
            })
            .collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_prune_stops_at_snapshot_floor() {
        let dir = TempDir::new().expect("tempdir");
        let (mut store, _) = EventStore::open(dir.path(), StoreConfig::default()).expect("open");

        for round in 1..=3u64 {
            store
                .append(&event(1, round, format!("r{round}").into_bytes()))
                .expect("append");
            store.roll().expect("roll");
        }
        store.append(&event(2, 4, b"live".to_vec())).expect("append");

        store.set_snapshot_floor(3);
        let removed = store.prune_older_than(10).expect("prune");
        assert_eq!(removed, 2, "floor keeps the covering segment");
        assert_eq!(store.segment_count(), 2);

        let rounds: Vec<Round> = store
            .replay()
            .map(|r| r.expect("replay record").birth_round())
            .collect();
        assert_eq!(rounds, vec![3, 4]);
    }

    #[test]
    fn test_missing_segment_is_fatal_unless_allowed() {
        let dir = TempDir::new().expect("tempdir");
        let (mut store, _) = EventStore::open(dir.path(), StoreConfig::default()).expect("open");
        for round in 1..=3u64 {
            store
                .append(&event(1, round, format!("r{round}").into_bytes()))
                .expect("append");
            store.roll().expect("roll");
        }
        drop(store);

        let middle = fs::read_dir(dir.path())
            .expect("read dir")
            .map(|e| e.expect("dir entry").path())
            .find(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("segment-0000000001"))
            })
            .expect("middle segment present");
        fs::remove_file(middle).expect("remove middle segment");

        let err = EventStore::open(dir.path(), StoreConfig::default())
            .expect_err("gap is fatal by default");
        assert!(matches!(
            err,
            StoreError::GapDetected {
                missing_from: 1,
                missing_to: 1
            }
        ));

        let tolerant = StoreConfig {
            gap_policy: GapPolicy::Allow,
            ..StoreConfig::default()
        };
        let (store, report) = EventStore::open(dir.path(), tolerant).expect("tolerated gap");
        assert_eq!(report.gaps, vec![(1, 1)]);
        assert_eq!(report.events_recovered, 2);
        assert!(report.repaired());
        assert_eq!(store.segment_count(), 2);
    }
}
