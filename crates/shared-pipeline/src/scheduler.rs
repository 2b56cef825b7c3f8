//! # Pipeline Scheduler
//!
//! Owns the stage graph: registers stages, spawns their tasks on the shared
//! runtime worker pool, and drives cooperative shutdown. Stages are
//! registered sink-first (a producer needs its downstream handle to exist),
//! so shutdown walks the registration order in reverse and stops sources
//! first; queues then drain toward the sinks.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info};

use crate::health::{HealthConfig, HealthMonitor, HealthSnapshot};
use crate::stage::{StageHandle, StageState, StageStats, StageWorker};

struct StageRuntime {
    name: String,
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// The stage graph and its health monitor.
///
/// Must be constructed from within a Tokio runtime; both the stages and the
/// monitor are spawned onto it.
pub struct Pipeline {
    stages: Vec<StageRuntime>,
    registry: Arc<RwLock<Vec<Arc<StageStats>>>>,
    epoch: Instant,
    monitor: HealthMonitor,
}

impl Pipeline {
    /// Creates an empty pipeline and starts its health monitor.
    #[must_use]
    pub fn new(health: HealthConfig) -> Self {
        let registry: Arc<RwLock<Vec<Arc<StageStats>>>> = Arc::new(RwLock::new(Vec::new()));
        let monitor = HealthMonitor::spawn(health, Arc::clone(&registry));
        Self {
            stages: Vec::new(),
            registry,
            epoch: Instant::now(),
            monitor,
        }
    }

    /// Registers a stage and spawns its task.
    ///
    /// `capacity` bounds the input queue; a full queue makes `submit` wait
    /// and `try_submit` refuse. Register a sink before the stages that feed
    /// it, then shut down via [`Pipeline::shutdown`], which stops sources
    /// first and lets queues drain downstream.
    pub fn add_stage<T, W>(&mut self, name: &str, capacity: usize, worker: W) -> StageHandle<T>
    where
        T: Send + 'static,
        W: StageWorker<T> + 'static,
    {
        let (tx, rx) = mpsc::channel::<T>(capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(StageStats::new(name.to_string(), self.epoch));
        self.registry.write().push(Arc::clone(&stats));

        let join = spawn_stage_task(rx, shutdown_rx, Arc::clone(&stats), worker);
        self.stages.push(StageRuntime {
            name: name.to_string(),
            shutdown_tx,
            join,
        });
        info!("[bn-05] stage '{name}' registered (capacity {capacity})");

        StageHandle::new(tx, stats)
    }

    /// Number of registered stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Latest health snapshot.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        self.monitor.latest()
    }

    /// Watch-backed subscription to health snapshots.
    #[must_use]
    pub fn health_watch(&self) -> watch::Receiver<HealthSnapshot> {
        self.monitor.subscribe()
    }

    /// Health snapshots as an async stream, one per sampling period.
    #[must_use]
    pub fn health_stream(&self) -> WatchStream<HealthSnapshot> {
        WatchStream::new(self.monitor.subscribe())
    }

    /// Stops every stage cooperatively, sources first, then the monitor.
    ///
    /// Each stage stops accepting input, drains its queue, and exits before
    /// the next one is signaled. Returns once the whole graph is stopped.
    pub async fn shutdown(mut self) {
        let total = self.stages.len();
        info!("[bn-05] pipeline shutdown: stopping {total} stages, sources first");
        for stage in self.stages.drain(..).rev() {
            let _ = stage.shutdown_tx.send(true);
            match stage.join.await {
                Ok(()) => info!("[bn-05] stage '{}' stopped", stage.name),
                Err(e) => error!(stage = %stage.name, error = %e, "stage task join failed"),
            }
        }
        self.monitor.stop().await;
        info!("[bn-05] pipeline stopped");
    }
}

fn spawn_stage_task<T, W>(
    mut rx: mpsc::Receiver<T>,
    mut shutdown_rx: watch::Receiver<bool>,
    stats: Arc<StageStats>,
    mut worker: W,
) -> JoinHandle<()>
where
    T: Send + 'static,
    W: StageWorker<T> + 'static,
{
    tokio::spawn(async move {
        stats.set_state(StageState::Running);
        stats.mark_progress();
        debug!(stage = %stats.name(), "stage running");
        loop {
            tokio::select! {
                // A dropped sender counts as a shutdown signal too.
                _ = shutdown_rx.changed() => break,
                item = rx.recv() => match item {
                    Some(item) => {
                        stats.item_taken();
                        worker.process(item).await;
                        stats.item_done();
                    }
                    None => break,
                },
            }
        }

        // Refuse new input, then finish whatever is already queued.
        stats.set_state(StageState::Draining);
        rx.close();
        while let Some(item) = rx.recv().await {
            stats.item_taken();
            worker.process(item).await;
            stats.item_done();
        }
        stats.set_state(StageState::Stopped);
        debug!(stage = %stats.name(), "stage stopped");
    })
}
