//! # Stage Wiring
//!
//! Builds the runtime's stage graph on the shared pipeline:
//!
//! ```text
//! gossip ─▶ EventIntake::submit ─▶ [durable] ─▶ [dispatch] ─▶ ConsensusSink
//!           (sync front door)      owns the      hands events
//!                                  EventStore    to the engine
//! ```
//!
//! The durable stage worker is the only appender; with one worker per stage
//! every append is serialized, which is exactly the single-open-segment
//! discipline the store requires. The store sits behind a mutex only for the
//! maintenance surface (ancient-round pruning runs between appends). A
//! failed durable write is not retried: the worker reports it on the fatal
//! channel and drops further input while the runtime shuts the node down.
//!
//! Stages are registered sink-first so shutdown stops the producing side
//! first and drains downstream queues.

use std::sync::Arc;

use async_trait::async_trait;
use bn_02_intake::{
    AdmissionGate, AlwaysAdmit, Ed25519Verifier, EventIntake, GateKind, PerPeerGate,
};
use bn_03_event_store::EventStore;
use parking_lot::Mutex;
use shared_pipeline::{Pipeline, StageHandle, StageWorker};
use shared_types::{short_hex, AdmittedEvent, ComponentId, MembershipView};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::config::NodeConfig;
use crate::ports::ConsensusSink;

/// A fatal condition reported by a stage worker.
///
/// Workers never panic and never exit the process themselves; the runtime
/// owns termination.
#[derive(Debug)]
pub struct FatalReport {
    /// Component that hit the condition.
    pub component: ComponentId,
    /// The condition, with full context attached.
    pub error: anyhow::Error,
}

/// The wired stage graph, ready to run.
pub struct NodeStages {
    /// The scheduler running the durable and dispatch stages.
    pub pipeline: Pipeline,
    /// The gossip-facing front door.
    pub intake: Arc<EventIntake>,
    /// The durable log; appends go through the durable stage, the registry
    /// takes the lock only for pruning and status.
    pub store: Arc<Mutex<EventStore>>,
    /// Receives at most one report before the node terminates.
    pub fatal_rx: mpsc::Receiver<FatalReport>,
}

/// Wires intake, durable write, and dispatch onto a fresh pipeline.
#[must_use]
pub fn build(
    view: &MembershipView,
    store: EventStore,
    sink: Arc<dyn ConsensusSink>,
    config: &NodeConfig,
) -> NodeStages {
    let mut pipeline = Pipeline::new(config.pipeline.health());
    let capacity = config.pipeline.stage_capacity;
    let (fatal_tx, fatal_rx) = mpsc::channel(1);
    let store = Arc::new(Mutex::new(store));

    let dispatch = pipeline.add_stage("dispatch", capacity, DispatchWorker { sink });
    let durable = pipeline.add_stage(
        "durable",
        capacity,
        DurableWorker {
            store: Arc::clone(&store),
            dispatch,
            fatal: fatal_tx,
            failed: false,
        },
    );

    let gate: Arc<dyn AdmissionGate> = match config.intake.gate {
        GateKind::PerPeer => Arc::new(PerPeerGate::new(view, config.intake.per_peer_limit)),
        GateKind::AlwaysAdmit => Arc::new(AlwaysAdmit),
    };
    let intake = Arc::new(EventIntake::new(
        view.clone(),
        gate,
        Arc::new(Ed25519Verifier),
        durable,
        &config.intake,
    ));

    info!(
        gate = ?config.intake.gate,
        capacity,
        "[bn-06] stage graph wired: intake -> durable -> dispatch"
    );
    NodeStages {
        pipeline,
        intake,
        store,
        fatal_rx,
    }
}

/// Appends each admitted event to the durable log, then forwards it.
struct DurableWorker {
    store: Arc<Mutex<EventStore>>,
    dispatch: StageHandle<AdmittedEvent>,
    fatal: mpsc::Sender<FatalReport>,
    failed: bool,
}

#[async_trait]
impl StageWorker<AdmittedEvent> for DurableWorker {
    async fn process(&mut self, event: AdmittedEvent) {
        if self.failed {
            // The node is coming down; nothing more may be vouched for.
            trace!(
                id = %short_hex(&event.id),
                "[bn-06] dropping event after durable failure"
            );
            return;
        }
        // Guard scoped so it is gone before any await point.
        let appended = { self.store.lock().append(&event) };
        match appended {
            Ok(position) => {
                trace!(
                    id = %short_hex(&event.id),
                    segment = position.segment,
                    offset = position.offset,
                    "[bn-06] event durable"
                );
                if let Err(e) = self.dispatch.submit(event).await {
                    // Only happens when dispatch is already draining during
                    // shutdown; the event is durable and will replay.
                    debug!(error = %e, "[bn-06] dispatch refused durable event");
                }
            }
            Err(e) => {
                error!(
                    id = %short_hex(&event.id),
                    creator = %event.creator(),
                    error = %e,
                    "[bn-06] durable write failed, reporting fatal"
                );
                self.failed = true;
                let report = FatalReport {
                    component: ComponentId::EventStore,
                    error: anyhow::Error::new(e).context("durable write"),
                };
                let _ = self.fatal.send(report).await;
            }
        }
    }
}

/// Hands each durable event to the consensus sink.
struct DispatchWorker {
    sink: Arc<dyn ConsensusSink>,
}

#[async_trait]
impl StageWorker<AdmittedEvent> for DispatchWorker {
    async fn process(&mut self, event: AdmittedEvent) {
        self.sink.deliver(event).await;
    }
}
