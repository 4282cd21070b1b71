//! Bounded pool for blocking file and process I/O.

use std::sync::Arc;

use tokio::sync::Semaphore;
use woda_common::CapabilityError;

/// Runs blocking closures on tokio's blocking threads, at most `size` at a
/// time. Jobs are never cancelled once started.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn run<F, T>(&self, job: F) -> Result<T, CapabilityError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| CapabilityError::Worker(e.to_string()))?;

        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await;

        result.map_err(|e| CapabilityError::Worker(format!("worker task failed: {e}")))
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(4)
    }
}
