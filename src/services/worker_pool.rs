use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Reference capacity of the shared tick pool.
pub const DEFAULT_POOL_SIZE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("worker pool is closed")]
pub struct PoolClosed;

/// Fixed-capacity pool shared by every recurring job.
///
/// A tick must hold a permit while it runs. When all permits are taken,
/// `acquire` waits in FIFO order, so ticks are queued rather than dropped.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free worker.
    ///
    /// Returns a guard that gives the worker back when dropped, or
    /// `PoolClosed` once the pool has been shut down.
    pub async fn acquire(&self) -> Result<WorkerPermit, PoolClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolClosed)?;

        Ok(WorkerPermit { _permit: permit })
    }

    /// Stop handing out permits. Pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Workers not currently running a tick (for monitoring)
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Guard that holds a worker slot
pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
}
