//! A bounded pool for running fetches.

use std::future::Future;
use std::sync::Arc;

use sentry::{Hub, SentryFutureExt};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Runs jobs on a tokio runtime, with at most `size` of them executing at the same time.
///
/// Jobs beyond that limit are queued until a running job finishes. The pool does not give any
/// ordering guarantees between queued jobs.
#[derive(Clone)]
pub struct WorkerPool {
    runtime: Handle,
    permits: Arc<Semaphore>,
    size: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("idle", &self.permits.available_permits())
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool of `size` workers, spawning onto `runtime`.
    ///
    /// A `size` of zero is treated as one.
    pub fn new(size: usize, runtime: Handle) -> Self {
        let size = size.max(1);
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// The maximum number of concurrently executing jobs.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The number of workers not currently executing a job.
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }

    /// Spawns `job` onto the pool.
    ///
    /// The job starts once a worker is free. It runs to completion even if the returned handle
    /// is dropped. The currently active [`sentry::Hub`] is propagated to the job.
    pub fn spawn<F>(&self, job: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        let job = async move {
            // The semaphore is never closed.
            let _permit = permits.acquire_owned().await.ok();
            job.await
        };
        self.runtime.spawn(job.bind_hub(Hub::new_from_top(Hub::current())))
    }
}
