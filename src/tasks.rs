use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Delayed one-shot jobs keyed by an id (a channel id for cleanup checks).
///
/// At most one job is pending per key. A job drops its key as soon as its delay
/// elapses, so work scheduled while it is running gets a fresh job instead of
/// being absorbed.
#[derive(Debug, Default)]
pub struct TaskManager {
    pending: Arc<DashMap<u64, JoinHandle<()>>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when a job for `key` is already waiting.
    pub fn schedule_once<F, Fut>(&self, key: u64, delay: Duration, job: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        match self.pending.entry(key) {
            Entry::Occupied(entry) if !entry.get().is_finished() => {
                debug!("Job {} already pending", key);
                false
            }
            entry => {
                let pending = Arc::clone(&self.pending);
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    pending.remove(&key);
                    job().await;
                });
                match entry {
                    Entry::Occupied(mut occupied) => {
                        occupied.insert(handle);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(handle);
                    }
                }
                true
            }
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self, key: u64) -> bool {
        self.pending
            .get(&key)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn shutdown(&self) {
        let keys: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        let handles: Vec<JoinHandle<()>> = keys
            .into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|(_, handle)| handle))
            .collect();

        for handle in &handles {
            handle.abort();
        }
        join_all(handles).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn runs_after_delay() {
        let tasks = TaskManager::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        assert!(tasks.schedule_once(7, Duration::from_secs(1), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(tasks.is_pending(7));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!tasks.is_pending(7));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_key_absorbs_duplicates() {
        let tasks = TaskManager::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&runs);
            tasks.schedule_once(7, Duration::from_secs(1), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let counter = Arc::clone(&runs);
        assert!(tasks.schedule_once(7, Duration::from_secs(1), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_jobs() {
        let tasks = TaskManager::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&runs);
        tasks.schedule_once(1, Duration::from_secs(5), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tasks.shutdown().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!tasks.is_pending(1));
    }
}
