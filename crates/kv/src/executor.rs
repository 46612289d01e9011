//! Bounded fan-out executor shared by coordinator calls.
//!
//! Node calls run as tokio tasks, each holding one permit of a semaphore
//! for its lifetime. `shutdown` closes the semaphore: tasks still queued for
//! a permit give up, and later spawns are refused.

use crate::error::KvError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct FanOutExecutor {
    permits: Arc<Semaphore>,
    max_permits: usize,
    shut_down: Arc<AtomicBool>,
}

impl FanOutExecutor {
    pub fn new(max_permits: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_permits)),
            max_permits,
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fail fast with [`KvError::ShutDown`] once `shutdown` has been called.
    pub fn ensure_running(&self) -> Result<(), KvError> {
        if self.is_shut_down() {
            return Err(KvError::ShutDown);
        }
        Ok(())
    }

    /// Run `fut` on the runtime once a permit is free.
    ///
    /// The task resolves to `Err(ShutDown)` if the executor is shut down
    /// before it gets a permit.
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<Result<T, KvError>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.map_err(|_| KvError::ShutDown)?;
            Ok(fut.await)
        })
    }

    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            self.permits.close();
            tracing::info!("fan-out executor shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Default for FanOutExecutor {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Duration;

    #[tokio::test]
    async fn test_spawn_runs_task() {
        let exec = FanOutExecutor::new(2);
        let out = exec.spawn(async { 41 + 1 }).await.unwrap().unwrap();
        assert_eq!(out, 42);
        assert_eq!(exec.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let exec = FanOutExecutor::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                exec.spawn(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_work() {
        let exec = FanOutExecutor::new(4);
        assert!(exec.ensure_running().is_ok());

        exec.shutdown();
        exec.shutdown();
        assert!(exec.is_shut_down());
        assert!(matches!(exec.ensure_running(), Err(KvError::ShutDown)));

        let res = exec.spawn(async { 1 }).await.unwrap();
        assert!(matches!(res, Err(KvError::ShutDown)));
    }
}
