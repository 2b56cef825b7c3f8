//! # Stage Health Monitoring
//!
//! A periodic task samples every stage's queue depth and last-progress
//! timestamp. A stage with queued input and no completed work for longer
//! than the stall threshold is reported `Stalled`. Reporting is the whole
//! job: a fatal stall needs an operator or supervisor decision, never an
//! automatic restart.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::stage::{StageState, StageStats};

/// Health monitor tuning.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// How long a stage may sit on a non-empty queue without completing an
    /// item before it is reported stalled.
    pub stall_threshold: Duration,
    /// How often stages are sampled.
    pub sampling_period: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            stall_threshold: Duration::from_secs(5),
            sampling_period: Duration::from_secs(1),
        }
    }
}

/// One stage's condition at sampling time.
#[derive(Debug, Clone)]
pub struct StageHealth {
    /// Stage name as registered.
    pub name: String,
    /// Lifecycle state at sampling time.
    pub state: StageState,
    /// Items waiting in the stage queue.
    pub queue_depth: usize,
    /// Items processed to completion since start.
    pub processed: u64,
    /// Milliseconds since the stage last completed an item.
    pub idle_millis: u64,
    /// Whether the stall threshold was exceeded with work queued.
    pub stalled: bool,
}

/// Condition of every stage, refreshed each sampling period.
#[derive(Debug, Clone, Default)]
pub struct HealthSnapshot {
    /// Per-stage conditions, in registration order.
    pub stages: Vec<StageHealth>,
}

impl HealthSnapshot {
    /// Whether any stage is currently stalled.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.stages.iter().any(|s| s.stalled)
    }

    /// Looks up one stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageHealth> {
        self.stages.iter().find(|s| s.name == name)
    }
}

pub(crate) struct HealthMonitor {
    join: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    health_rx: watch::Receiver<HealthSnapshot>,
}

impl HealthMonitor {
    pub(crate) fn spawn(
        config: HealthConfig,
        registry: Arc<RwLock<Vec<Arc<StageStats>>>>,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (health_tx, health_rx) = watch::channel(HealthSnapshot::default());

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.sampling_period);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let snapshot = sample(&registry, &config);
                        let _ = health_tx.send(snapshot);
                    }
                }
            }
        });

        Self {
            join,
            shutdown_tx,
            health_rx,
        }
    }

    pub(crate) fn latest(&self) -> HealthSnapshot {
        self.health_rx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<HealthSnapshot> {
        self.health_rx.clone()
    }

    pub(crate) async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}

fn sample(registry: &RwLock<Vec<Arc<StageStats>>>, config: &HealthConfig) -> HealthSnapshot {
    let threshold_millis = u64::try_from(config.stall_threshold.as_millis()).unwrap_or(u64::MAX);
    let mut stages = Vec::new();

    for stats in registry.read().iter() {
        let state = stats.state();
        let queue_depth = stats.queue_depth();
        let idle_millis = stats.idle_millis();
        let live = matches!(state, StageState::Running | StageState::Draining);
        let stalled = live && queue_depth > 0 && idle_millis >= threshold_millis;

        if stalled && !stats.is_stalled() {
            warn!(
                stage = %stats.name(),
                queue_depth,
                idle_millis,
                "[bn-05] stage stalled: queued work without progress"
            );
        } else if !stalled && stats.is_stalled() {
            info!(stage = %stats.name(), "[bn-05] stage recovered from stall");
        }
        stats.set_stalled(stalled);

        stages.push(StageHealth {
            name: stats.name().to_string(),
            state,
            queue_depth,
            processed: stats.processed(),
            idle_millis,
            stalled,
        });
    }

    HealthSnapshot { stages }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tokio::time::timeout;

    use super::*;

    fn registry_with(stats: Arc<StageStats>) -> Arc<RwLock<Vec<Arc<StageStats>>>> {
        Arc::new(RwLock::new(vec![stats]))
    }

    #[tokio::test]
    async fn test_reports_stall_after_threshold_with_queued_work() {
        let stats = Arc::new(StageStats::new("stuck".to_string(), Instant::now()));
        stats.set_state(StageState::Running);
        stats.mark_progress();
        stats.item_queued();

        let monitor = HealthMonitor::spawn(
            HealthConfig {
                stall_threshold: Duration::from_millis(80),
                sampling_period: Duration::from_millis(20),
            },
            registry_with(Arc::clone(&stats)),
        );

        let mut rx = monitor.subscribe();
        let stalled = timeout(Duration::from_secs(2), async {
            loop {
                rx.changed().await.expect("monitor alive");
                let snap = rx.borrow().clone();
                if snap.stage("stuck").is_some_and(|s| s.stalled) {
                    return snap;
                }
            }
        })
        .await
        .expect("stall should be reported");

        assert!(stalled.is_degraded());
        assert!(stats.is_stalled());
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_empty_queue_never_stalls() {
        let stats = Arc::new(StageStats::new("idle".to_string(), Instant::now()));
        stats.set_state(StageState::Running);

        let monitor = HealthMonitor::spawn(
            HealthConfig {
                stall_threshold: Duration::from_millis(10),
                sampling_period: Duration::from_millis(10),
            },
            registry_with(Arc::clone(&stats)),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!monitor.latest().is_degraded());
        monitor.stop().await;
    }

    #[tokio::test]
    async fn test_recovery_clears_stall_flag() {
        let stats = Arc::new(StageStats::new("bursty".to_string(), Instant::now()));
        stats.set_state(StageState::Running);
        stats.item_queued();

        let monitor = HealthMonitor::spawn(
            HealthConfig {
                stall_threshold: Duration::from_millis(30),
                sampling_period: Duration::from_millis(10),
            },
            registry_with(Arc::clone(&stats)),
        );

        let mut rx = monitor.subscribe();
        timeout(Duration::from_secs(2), async {
            loop {
                rx.changed().await.expect("monitor alive");
                if rx.borrow().stage("bursty").is_some_and(|s| s.stalled) {
                    break;
                }
            }
        })
        .await
        .expect("stall first");

        // Progress resumes and the queue empties.
        stats.item_taken();
        stats.item_done();
        timeout(Duration::from_secs(2), async {
            loop {
                rx.changed().await.expect("monitor alive");
                if rx.borrow().stage("bursty").is_some_and(|s| !s.stalled) {
                    break;
                }
            }
        })
        .await
        .expect("recovery should be reported");
        assert!(!stats.is_stalled());
        monitor.stop().await;
    }
}
