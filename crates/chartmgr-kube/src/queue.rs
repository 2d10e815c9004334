//! Per-identity work queue
//!
//! Jobs submitted for the same [`ResourceId`] run one at a time in submission
//! order; jobs for different identities run concurrently. Each identity gets a
//! single worker that exists only while it has work: it is created by the
//! submit that finds no worker and removes itself once its queue is drained.
//! A panicking job is logged and does not take the jobs behind it down.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chartmgr_core::ResourceId;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::error;

/// A unit of work for one identity
pub type Job = BoxFuture<'static, ()>;

type Workers = Arc<Mutex<HashMap<ResourceId, mpsc::UnboundedSender<Job>>>>;

/// Serializes jobs per identity
#[derive(Clone, Default)]
pub struct IdentityQueue {
    workers: Workers,
}

impl IdentityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job` behind any pending work for `id`.
    ///
    /// Returns the worker future when no worker is running for `id`; the
    /// caller must spawn it. Returns `None` when an existing worker took the job.
    pub fn submit(&self, id: ResourceId, job: Job) -> Option<Job> {
        let mut workers = lock(&self.workers);

        let job = match workers.get(&id) {
            Some(tx) => match tx.send(job) {
                Ok(()) => return None,
                // Worker task was dropped without deregistering
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive, the send cannot fail
        let _ = tx.send(job);
        workers.insert(id.clone(), tx);

        Some(run_worker(Arc::clone(&self.workers), id, rx).boxed())
    }

    /// Number of identities with a running worker
    pub fn active(&self) -> usize {
        lock(&self.workers).len()
    }
}

async fn run_worker(workers: Workers, id: ResourceId, mut rx: mpsc::UnboundedReceiver<Job>) {
    loop {
        let job = {
            let mut workers = lock(&workers);
            match rx.try_recv() {
                Ok(job) => job,
                Err(_) => {
                    // Deregister under the lock so no submit can slip a job in
                    workers.remove(&id);
                    return;
                }
            }
        };
        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            error!(resource = %id, "queued handler panicked, continuing with the next event");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
