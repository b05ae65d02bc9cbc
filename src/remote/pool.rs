//! Bounded fetch worker pool.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// At most `max_workers` fetches run at once. Submitting while the pool is
/// saturated waits for a free slot; work is never dropped.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Free worker slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free slot, then run `task` on it.
    pub async fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self.permits.clone().acquire_owned().await.ok();
        tokio::spawn(async move {
            let _permit = permit;
            task.await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_submission_waits_when_saturated() {
        let pool = WorkerPool::new(2);
        let (release_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        let started = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let mut release = release_tx.subscribe();
            let started = started.clone();
            pool.spawn(async move {
                started.fetch_add(1, Ordering::SeqCst);
                let _ = release.recv().await;
            })
            .await;
        }
        assert_eq!(pool.available(), 0);

        let third = {
            let pool = pool.clone();
            let started = started.clone();
            tokio::spawn(async move {
                pool.spawn(async move {
                    started.fetch_add(1, Ordering::SeqCst);
                })
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!third.is_finished());

        release_tx.send(()).unwrap();
        third.await.unwrap().await.unwrap();
        assert_eq!(started.load(Ordering::SeqCst), 3);
    }
}
