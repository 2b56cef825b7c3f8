//! # Bootstrap Coordinator
//!
//! Drives the node from a cold start to `Ready` through a fixed phase
//! sequence, failing fast on the first error:
//!
//! ```text
//! LoadConfig ─▶ ResolveMembership ─▶ RecoverDurableLog ─▶
//!     InitializeScratchpad ─▶ BuildScheduler ─▶ Ready
//! ```
//!
//! `LoadConfig` validates the configuration, takes the data-directory lock,
//! and classifies the start against the version marker. The marker is only
//! rewritten once every later phase has succeeded, so a crash anywhere in
//! this sequence leaves the previous lifetime's marker intact.
//!
//! Between recovery and scheduler construction every surviving durable event
//! is replayed into the consensus sink. Gossip cannot reach the intake until
//! the scheduler exists, so the engine always sees the full durable prefix
//! before the first live event.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use bn_03_event_store::{EventStore, RecoveryReport};
use bn_04_scratchpad::IncidentScratchpad;
use parking_lot::Mutex;
use shared_pipeline::Pipeline;
use shared_types::EventId;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::context::NodeContext;
use crate::errors::ConfigError;
use crate::lock::DataDirLock;
use crate::marker::{self, NodeMarker, StartKind};
use crate::ports::ConsensusSink;
use crate::registry::CapabilityRegistry;
use crate::wiring::{self, FatalReport};

/// One step of the bootstrap sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    /// Validate configuration, lock the data directory, classify the start.
    LoadConfig,
    /// Load the roster and resolve the governing membership view.
    ResolveMembership,
    /// Recover the durable event log.
    RecoverDurableLog,
    /// Load the incident scratchpad and run the restart safety check.
    InitializeScratchpad,
    /// Replay durable events and wire the stage graph.
    BuildScheduler,
    /// Bootstrap complete.
    Ready,
}

impl BootPhase {
    /// Stable phase name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::LoadConfig => "load-config",
            Self::ResolveMembership => "resolve-membership",
            Self::RecoverDurableLog => "recover-durable-log",
            Self::InitializeScratchpad => "initialize-scratchpad",
            Self::BuildScheduler => "build-scheduler",
            Self::Ready => "ready",
        }
    }
}

/// What bootstrap found and did, for logs and tests.
#[derive(Debug)]
pub struct BootstrapReport {
    /// Genesis, restart, or upgrade.
    pub start: StartKind,
    /// Whether the roster replaced the persisted membership.
    pub membership_changed: bool,
    /// What durable-log recovery found.
    pub recovery: RecoveryReport,
    /// Events replayed into the consensus sink before gossip admission.
    pub replayed_events: u64,
    /// Incidents on file at startup.
    pub incidents_on_file: usize,
}

/// A node that reached `Ready`. Holds the data-directory lock until dropped.
pub struct RunningNode {
    /// Identity and membership facts for this lifetime.
    pub context: NodeContext,
    /// The node's operation surface.
    pub registry: CapabilityRegistry,
    /// What bootstrap did.
    pub report: BootstrapReport,
    pipeline: Pipeline,
    fatal_rx: tokio::sync::mpsc::Receiver<FatalReport>,
    _lock: DataDirLock,
}

impl fmt::Debug for RunningNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningNode")
            .field("context", &self.context)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl RunningNode {
    /// Resolves when a stage worker reports an unrecoverable condition.
    /// `None` means every sender is gone, which only happens at shutdown.
    pub async fn wait_for_fatal(&mut self) -> Option<FatalReport> {
        self.fatal_rx.recv().await
    }

    /// Stops the stage graph, sources first, and releases the data
    /// directory.
    pub async fn shutdown(self) {
        self.pipeline.shutdown().await;
        info!("[bn-06] node stopped");
    }
}

/// Sequential startup state machine; see the module docs.
pub struct NodeBootstrapCoordinator {
    config: NodeConfig,
}

impl NodeBootstrapCoordinator {
    /// A coordinator for one bootstrap attempt.
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    /// Runs every phase; on success the node is live behind the returned
    /// handle. Any error is process-fatal and leaves no partial node.
    pub async fn bootstrap(self, sink: Arc<dyn ConsensusSink>) -> Result<RunningNode> {
        let started = Instant::now();
        let config = self.config;

        enter(BootPhase::LoadConfig);
        config.validate().context("configuration rejected")?;
        let lock =
            DataDirLock::acquire(&config.node.data_dir).context("data directory lock")?;
        let marker_path = config.node.data_dir.join(marker::MARKER_FILE);
        let persisted_marker = marker::load(&marker_path).context("version marker")?;
        let running_version = env!("CARGO_PKG_VERSION");
        let start = marker::classify(running_version, persisted_marker.as_ref())
            .context("version marker")?;
        info!(
            version = running_version,
            start = ?start,
            node_id = %config.node.node_id,
            "[bn-06] start classified"
        );

        enter(BootPhase::ResolveMembership);
        let roster = bn_01_membership::load_roster(&config.node.roster_path)
            .context("bootstrap roster")?;
        let persisted_view = persisted_marker.as_ref().map(|m| m.membership.clone());
        let resolution = bn_01_membership::resolve(
            config.node.node_id,
            roster,
            persisted_view,
            start.is_upgrade(),
        )
        .context("membership resolution")?;

        enter(BootPhase::RecoverDurableLog);
        let events_dir = config.node.data_dir.join("events");
        let (mut store, recovery) =
            EventStore::open(&events_dir, config.store.clone()).context("durable log recovery")?;
        if recovery.repaired() {
            warn!(
                truncated_bytes = recovery.truncated_bytes,
                discarded_records = recovery.discarded_records,
                gaps = recovery.gaps.len(),
                "[bn-06] durable log needed repair"
            );
        }

        enter(BootPhase::InitializeScratchpad);
        let scratchpad_path = config.node.data_dir.join("scratchpad").join("incidents.json");
        let scratchpad =
            IncidentScratchpad::open(&scratchpad_path).context("incident scratchpad")?;
        scratchpad.log_contents();
        let incidents_on_file = scratchpad.len();
        let snapshot_round = persisted_marker.as_ref().map_or(0, |m| m.snapshot_round);
        if let Some(incident) = scratchpad.latest_at_or_after(snapshot_round) {
            if config.node.unsafe_restart_override {
                warn!(
                    incident_round = incident.round,
                    snapshot_round,
                    kind = %incident.kind,
                    "[bn-06] UNSAFE RESTART OVERRIDE set: starting despite recorded incident"
                );
            } else {
                return Err(ConfigError::UnsafeRestart {
                    incident_round: incident.round,
                    snapshot_round,
                }
                .into());
            }
        }
        if snapshot_round > 0 {
            store.set_snapshot_floor(snapshot_round);
        }

        enter(BootPhase::BuildScheduler);
        let (replayed_events, recent_ids) =
            replay(&store, sink.as_ref(), config.intake.dedup_max_entries)
                .await
                .context("startup replay")?;
        info!(
            replayed = replayed_events,
            "[bn-06] durable events replayed to consensus sink"
        );
        let stages = wiring::build(&resolution.current, store, sink, &config);
        let preloaded = stages.intake.preload_recent(recent_ids);
        if preloaded > 0 {
            info!(preloaded, "[bn-06] duplicate index seeded from replay");
        }

        let new_marker = NodeMarker {
            version: running_version.to_string(),
            node_id: config.node.node_id,
            membership: resolution.current.clone(),
            snapshot_round,
        };
        marker::store(&marker_path, &new_marker).context("version marker rewrite")?;

        enter(BootPhase::Ready);
        let context = NodeContext {
            node_id: config.node.node_id,
            view: resolution.current,
            previous_view: resolution.previous,
            membership_changed: resolution.changed,
            start,
            snapshot_round,
        };
        let registry = CapabilityRegistry::new(
            context.clone(),
            Arc::clone(&stages.intake),
            Arc::clone(&stages.store),
            Arc::new(Mutex::new(scratchpad)),
            stages.pipeline.health_watch(),
            config.pruning.ancient_round_offset,
        );
        let report = BootstrapReport {
            start,
            membership_changed: context.membership_changed,
            recovery,
            replayed_events,
            incidents_on_file,
        };
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            segments = report.recovery.segments,
            replayed = report.replayed_events,
            "[bn-06] node ready"
        );
        registry.log_status();

        Ok(RunningNode {
            context,
            registry,
            report,
            pipeline: stages.pipeline,
            fatal_rx: stages.fatal_rx,
            _lock: lock,
        })
    }
}

fn enter(phase: BootPhase) {
    info!(phase = phase.name(), "[bn-06] bootstrap phase");
}

/// Replays every durable event into the sink, in segment order.
///
/// Returns the count and the trailing ids (bounded by the duplicate index
/// size) used to seed intake dedup.
async fn replay(
    store: &EventStore,
    sink: &dyn ConsensusSink,
    keep_ids: usize,
) -> bn_03_event_store::StoreResult<(u64, VecDeque<EventId>)> {
    let mut count = 0u64;
    let mut ids = VecDeque::new();
    for event in store.replay() {
        let event = event?;
        if ids.len() == keep_ids {
            ids.pop_front();
        }
        ids.push_back(event.id);
        sink.deliver(event).await;
        count += 1;
    }
    Ok((count, ids))
}
