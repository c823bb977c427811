//! Launching of background relay tasks.
//!
//! The default is a plain `tokio::spawn` per trigger: unbounded concurrency
//! with no ordering between triggers. Two opt-in capabilities tighten that
//! without touching the pipeline: a global in-flight bound, and per-messageId
//! serialization through keyed async mutexes. Both wait *inside* the spawned
//! task, so dispatch itself never blocks the webhook ack.

use std::sync::Arc;

use {
    dashmap::DashMap,
    tokio::sync::{Mutex, Semaphore},
};

use herald_config::PipelineConfig;

pub struct RelayDispatcher {
    limiter: Option<Arc<Semaphore>>,
    per_message: Option<Arc<DashMap<String, Arc<Mutex<()>>>>>,
}

impl RelayDispatcher {
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            limiter: config
                .max_in_flight
                .map(|n| Arc::new(Semaphore::new(n.max(1)))),
            per_message: config.serialize_per_message.then(|| Arc::new(DashMap::new())),
        }
    }

    /// Launch one detached task. Panics and errors inside it stay inside it;
    /// the caller has already answered the webhook by the time it runs.
    pub fn dispatch<F>(&self, key: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let limiter = self.limiter.clone();
        let locks = self.per_message.clone();
        let lock = locks
            .as_ref()
            .map(|map| Arc::clone(&*map.entry(key.to_string()).or_default()));
        let key = key.to_string();

        tokio::spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => semaphore.acquire_owned().await.ok(),
                None => None,
            };
            match lock {
                Some(mutex) => {
                    let _guard = mutex.lock().await;
                    task.await;
                },
                None => task.await,
            }
            // Drop the lock entry once nothing else holds it.
            if let Some(map) = locks {
                map.remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
            }
        });
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    fn dispatcher(max_in_flight: Option<usize>, serialize: bool) -> RelayDispatcher {
        RelayDispatcher::new(&PipelineConfig {
            max_in_flight,
            serialize_per_message: serialize,
        })
    }

    /// Tracks how many dispatched tasks are running at once.
    #[derive(Default)]
    struct Overlap {
        current: AtomicUsize,
        peak: AtomicUsize,
        finished: AtomicUsize,
    }

    impl Overlap {
        async fn run(self: Arc<Self>) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait_for_finished(overlap: &Arc<Overlap>, n: usize) {
        for _ in 0..200 {
            if overlap.finished.load(Ordering::SeqCst) >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "only {} of {n} tasks finished",
            overlap.finished.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn default_runs_tasks_concurrently() {
        let d = dispatcher(None, false);
        let overlap = Arc::new(Overlap::default());
        for i in 0..4 {
            d.dispatch(&format!("m-{i}"), Arc::clone(&overlap).run());
        }
        wait_for_finished(&overlap, 4).await;
        assert!(overlap.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn max_in_flight_bounds_concurrency() {
        let d = dispatcher(Some(1), false);
        let overlap = Arc::new(Overlap::default());
        for i in 0..3 {
            d.dispatch(&format!("m-{i}"), Arc::clone(&overlap).run());
        }
        wait_for_finished(&overlap, 3).await;
        assert_eq!(overlap.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn same_key_serializes_when_enabled() {
        let d = dispatcher(None, true);
        let overlap = Arc::new(Overlap::default());
        for _ in 0..3 {
            d.dispatch("m-1", Arc::clone(&overlap).run());
        }
        wait_for_finished(&overlap, 3).await;
        assert_eq!(overlap.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_run_concurrently_when_serialized() {
        let d = dispatcher(None, true);
        let overlap = Arc::new(Overlap::default());
        d.dispatch("m-1", Arc::clone(&overlap).run());
        d.dispatch("m-2", Arc::clone(&overlap).run());
        wait_for_finished(&overlap, 2).await;
        assert!(overlap.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn lock_table_is_pruned_after_tasks_finish() {
        let d = dispatcher(None, true);
        let overlap = Arc::new(Overlap::default());
        d.dispatch("m-1", Arc::clone(&overlap).run());
        d.dispatch("m-1", Arc::clone(&overlap).run());
        wait_for_finished(&overlap, 2).await;
        // Removal happens after the last task's guard drops.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(d.per_message.as_ref().unwrap().is_empty());
    }
}
