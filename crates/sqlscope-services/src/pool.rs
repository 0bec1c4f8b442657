//! Fixed-size async worker pool with a bounded, fail-fast queue
//!
//! `pool_size` worker tasks pull from one shared channel of capacity
//! `queue_capacity`. At most `pool_size` tasks run at once and at most
//! `queue_capacity` wait; submitting beyond that fails immediately with
//! [`DispatchOverflowError`] instead of blocking the caller.
//!
//! Dropping the pool closes the queue; workers finish everything already
//! queued and then exit. [`WorkerPool::shutdown`] does the same and waits
//! for them.

use crate::error::{DispatchOverflowError, PoolError};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

type Job = BoxFuture<'static, ()>;

pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    pool_size: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    /// Spawn `pool_size` workers on the current tokio runtime
    pub fn new(pool_size: usize, queue_capacity: usize) -> Result<Self, PoolError> {
        if pool_size == 0 || queue_capacity == 0 {
            return Err(PoolError::Invalid(format!(
                "pool size ({pool_size}) and queue capacity ({queue_capacity}) must be at least 1"
            )));
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

        let (sender, receiver) = mpsc::channel::<Job>(queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let workers = (0..pool_size)
            .map(|worker| {
                let receiver = receiver.clone();
                handle.spawn(async move {
                    loop {
                        // Hold the lock only while waiting for the next job
                        let job = receiver.lock().await.recv().await;
                        match job {
                            Some(job) => job.await,
                            None => break,
                        }
                    }
                    tracing::trace!(worker, "analysis worker stopped");
                })
            })
            .collect();

        tracing::debug!(pool_size, queue_capacity, "analysis worker pool started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            pool_size,
            queue_capacity,
        })
    }

    /// Queue a job without waiting for space
    pub fn try_submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return Err(PoolError::Closed);
        };
        sender.try_send(Box::pin(job)).map_err(|err| match err {
            TrySendError::Full(_) => PoolError::Overflow(DispatchOverflowError {
                pool_size: self.pool_size,
                queue_capacity: self.queue_capacity,
            }),
            TrySendError::Closed(_) => PoolError::Closed,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stop accepting jobs, let queued and running jobs finish, and wait for
    /// every worker to exit
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "analysis worker panicked");
            }
        }
        tracing::debug!("analysis worker pool shut down");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("pool_size", &self.pool_size)
            .field("queue_capacity", &self.queue_capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests;
