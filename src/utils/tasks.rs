// src/utils/tasks.rs

use std::{future::Future, sync::Arc};

use tokio::{sync::Semaphore, task::JoinHandle};
use tracing::Instrument;

/// Runs background grading work with a cap on how many tasks execute at once.
///
/// Spawning never blocks the caller; tasks beyond the cap wait for a permit.
#[derive(Clone)]
pub struct TaskRunner {
    permits: Arc<Semaphore>,
}

impl TaskRunner {
    pub fn new(concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn spawn<F>(&self, task: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        let span = tracing::info_span!("grading_task", task);

        tokio::spawn(
            async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    tracing::warn!("Task runner closed, dropping task");
                    return;
                };
                fut.await;
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let runner = TaskRunner::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                runner.spawn("test", async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(runner.permits.available_permits(), 2);
    }
}
