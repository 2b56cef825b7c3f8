//! # Scheduling Tests
//!
//! The stage graph under real load: a wedged consumer flagged by the health
//! monitor while a submission is still waiting, the flag clearing once the
//! consumer drains, and ordering preserved across chained stages.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::{Mutex, Notify, Semaphore};
    use tokio::time::timeout;

    use shared_pipeline::{worker_fn, HealthConfig, HealthSnapshot, Pipeline};

    fn fast_health() -> HealthConfig {
        HealthConfig {
            stall_threshold: Duration::from_millis(100),
            sampling_period: Duration::from_millis(20),
        }
    }

    /// Await snapshots until `accept` returns true for the named stage.
    async fn wait_for_stage(
        pipeline: &Pipeline,
        name: &str,
        accept: impl Fn(&shared_pipeline::StageHealth) -> bool,
    ) -> HealthSnapshot {
        let mut rx = pipeline.health_watch();
        timeout(Duration::from_secs(10), async {
            loop {
                rx.changed().await.expect("health monitor alive");
                let snap = rx.borrow().clone();
                if snap.stage(name).is_some_and(&accept) {
                    return snap;
                }
            }
        })
        .await
        .expect("condition should be observed")
    }

    /// A capacity-one stage with a blocked consumer: the second submission
    /// fills the queue, the third waits, and the monitor reports the stall
    /// while it is still waiting.
    #[tokio::test]
    async fn test_wedged_consumer_is_reported_stalled_while_submit_waits() {
        let mut pipeline = Pipeline::new(fast_health());
        let entered = Arc::new(Notify::new());
        let held = Arc::new(Semaphore::new(0));

        let seen = Arc::clone(&entered);
        let gate = Arc::clone(&held);
        let stage = pipeline.add_stage(
            "wedged",
            1,
            worker_fn(move |_n: u32| {
                let seen = Arc::clone(&seen);
                let gate = Arc::clone(&gate);
                async move {
                    seen.notify_one();
                    gate.acquire().await.expect("semaphore open").forget();
                }
            }),
        );

        stage.submit(1).await.expect("taken by worker");
        timeout(Duration::from_secs(5), entered.notified())
            .await
            .expect("worker picked up the first item");
        stage.try_submit(2).expect("fills the queue");

        let waiting = tokio::spawn({
            let stage = stage.clone();
            async move { stage.submit(3).await }
        });

        let snap = wait_for_stage(&pipeline, "wedged", |s| s.stalled).await;
        assert!(snap.is_degraded());
        assert!(
            snap.stage("wedged").is_some_and(|s| s.queue_depth >= 1),
            "work is queued behind the wedge"
        );
        assert!(!waiting.is_finished(), "third submission is still waiting");

        held.add_permits(3);
        waiting
            .await
            .expect("submit task")
            .expect("third submission lands once the queue moves");
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_stall_clears_once_the_consumer_drains() {
        let mut pipeline = Pipeline::new(fast_health());
        let held = Arc::new(Semaphore::new(0));

        let gate = Arc::clone(&held);
        let stage = pipeline.add_stage(
            "bursty",
            2,
            worker_fn(move |_n: u32| {
                let gate = Arc::clone(&gate);
                async move {
                    gate.acquire().await.expect("semaphore open").forget();
                }
            }),
        );

        stage.submit(1).await.expect("accepted");
        stage.submit(2).await.expect("accepted");
        wait_for_stage(&pipeline, "bursty", |s| s.stalled).await;

        held.add_permits(2);
        let snap = wait_for_stage(&pipeline, "bursty", |s| !s.stalled && s.processed == 2).await;
        assert!(!snap.is_degraded());
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_chained_stages_preserve_order_under_load() {
        let mut pipeline = Pipeline::new(HealthConfig::default());
        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        let sink_seen = Arc::clone(&seen);
        let sink = pipeline.add_stage(
            "sink",
            32,
            worker_fn(move |n: u32| {
                let sink_seen = Arc::clone(&sink_seen);
                async move {
                    sink_seen.lock().await.push(n);
                }
            }),
        );

        let forward = sink.clone();
        let source = pipeline.add_stage(
            "source",
            32,
            worker_fn(move |n: u32| {
                let forward = forward.clone();
                async move {
                    forward.submit(n * 2).await.expect("sink accepts");
                }
            }),
        );

        for n in 0..100 {
            source.submit(n).await.expect("source accepts");
        }
        pipeline.shutdown().await;

        let recorded = seen.lock().await;
        let expected: Vec<u32> = (0..100).map(|n| n * 2).collect();
        assert_eq!(*recorded, expected);
    }
}
