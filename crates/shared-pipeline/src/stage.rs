//! # Stage Primitives
//!
//! A stage is a named task with a bounded input queue. Producers hold a
//! [`StageHandle`] and either wait for room (`submit`) or get a typed refusal
//! (`try_submit`). The scheduler tracks per-stage counters for the health
//! monitor through [`StageStats`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;

/// Consumer side of a stage: processes one item at a time, in order.
///
/// Workers own their state; the scheduler calls `process` sequentially from
/// a single task, so no internal locking is needed for state only the worker
/// touches.
#[async_trait]
pub trait StageWorker<T: Send>: Send {
    /// Processes one item to completion.
    async fn process(&mut self, item: T);
}

/// Adapts a closure into a [`StageWorker`].
///
/// The closure must return an owned future, so stateful workers capture
/// their state in `Arc`s and clone into `async move` blocks. Workers with
/// exclusive mutable state implement [`StageWorker`] directly instead.
pub struct WorkerFn<F>(F);

/// Builds a [`StageWorker`] from a closure.
pub fn worker_fn<T, F, Fut>(f: F) -> WorkerFn<F>
where
    T: Send,
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    WorkerFn(f)
}

#[async_trait]
impl<T, F, Fut> StageWorker<T> for WorkerFn<F>
where
    T: Send + 'static,
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = ()> + Send,
{
    async fn process(&mut self, item: T) {
        (self.0)(item).await;
    }
}

/// Lifecycle of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Registered but not yet polled by the runtime.
    Idle,
    /// Accepting and processing input.
    Running,
    /// Shutdown signaled; queue is being drained, no new input accepted.
    Draining,
    /// Drained and exited.
    Stopped,
}

/// Errors from submitting to a stage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The stage queue is at capacity.
    #[error("stage '{stage}' queue is full")]
    QueueFull {
        /// Name of the refusing stage.
        stage: String,
    },
    /// The stage is draining or stopped and accepts no new input.
    #[error("stage '{stage}' is no longer accepting input")]
    Closed {
        /// Name of the refusing stage.
        stage: String,
    },
}

/// Shared counters for one stage, sampled by the health monitor.
pub struct StageStats {
    name: String,
    state: RwLock<StageState>,
    queue_depth: AtomicUsize,
    processed: AtomicU64,
    /// Milliseconds since `epoch` at which the stage last completed an item.
    last_progress: AtomicU64,
    stalled: AtomicBool,
    epoch: Instant,
}

impl StageStats {
    pub(crate) fn new(name: String, epoch: Instant) -> Self {
        Self {
            name,
            state: RwLock::new(StageState::Idle),
            queue_depth: AtomicUsize::new(0),
            processed: AtomicU64::new(0),
            last_progress: AtomicU64::new(0),
            stalled: AtomicBool::new(false),
            epoch,
        }
    }

    /// Stage name as registered.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StageState {
        *self.state.read()
    }

    /// Items currently waiting in the queue.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Acquire)
    }

    /// Items processed to completion since start.
    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Milliseconds without completed work, as of now.
    #[must_use]
    pub fn idle_millis(&self) -> u64 {
        self.now_millis()
            .saturating_sub(self.last_progress.load(Ordering::Acquire))
    }

    /// Whether the health monitor currently reports this stage stalled.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }

    pub(crate) fn set_state(&self, state: StageState) {
        *self.state.write() = state;
    }

    pub(crate) fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::Release);
    }

    pub(crate) fn item_queued(&self) {
        self.queue_depth.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn item_taken(&self) {
        self.queue_depth.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn item_done(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.mark_progress();
    }

    pub(crate) fn mark_progress(&self) {
        self.last_progress.store(self.now_millis(), Ordering::Release);
    }

    pub(crate) fn now_millis(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Producer-side handle for one stage.
///
/// Cloneable; every clone feeds the same queue. Items sent through one clone
/// arrive in the order that clone sent them.
pub struct StageHandle<T> {
    tx: mpsc::Sender<T>,
    stats: Arc<StageStats>,
}

impl<T> Clone for StageHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T: Send> StageHandle<T> {
    pub(crate) fn new(tx: mpsc::Sender<T>, stats: Arc<StageStats>) -> Self {
        Self { tx, stats }
    }

    /// Name of the stage this handle feeds.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        self.stats.name()
    }

    /// Submits an item, waiting for queue room.
    ///
    /// This is the cooperative backpressure path: a full queue makes the
    /// caller wait, which transitively slows every upstream producer.
    pub async fn submit(&self, item: T) -> Result<(), SubmitError> {
        self.check_accepting()?;
        let permit = self.tx.reserve().await.map_err(|_| SubmitError::Closed {
            stage: self.stats.name().to_string(),
        })?;
        // Count between reserve and send; the worker cannot take the item
        // before `permit.send`, so the decrement never runs first.
        self.stats.item_queued();
        permit.send(item);
        Ok(())
    }

    /// Submits an item without waiting.
    ///
    /// Boundaries that must answer immediately (the gossip front door) use
    /// this and translate `QueueFull` into a backpressure rejection.
    pub fn try_submit(&self, item: T) -> Result<(), SubmitError> {
        self.check_accepting()?;
        match self.tx.try_reserve() {
            Ok(permit) => {
                self.stats.item_queued();
                permit.send(item);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(())) => Err(SubmitError::QueueFull {
                stage: self.stats.name().to_string(),
            }),
            Err(mpsc::error::TrySendError::Closed(())) => Err(SubmitError::Closed {
                stage: self.stats.name().to_string(),
            }),
        }
    }

    /// Items currently waiting in the stage queue.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.stats.queue_depth()
    }

    fn check_accepting(&self) -> Result<(), SubmitError> {
        match self.stats.state() {
            StageState::Idle | StageState::Running => Ok(()),
            StageState::Draining | StageState::Stopped => Err(SubmitError::Closed {
                stage: self.stats.name().to_string(),
            }),
        }
    }
}
