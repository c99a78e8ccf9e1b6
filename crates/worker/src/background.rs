//! Fire-and-forget background tasks.
//!
//! A task's failure is observable only through the log. Nothing is ever
//! reported back to the request that spawned it.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use nimbus_core::Error;
use tokio::task::JoinHandle;

/// Spawner for detached tasks with a logging error sink.
#[derive(Debug, Default)]
pub struct Background {
    handles: Mutex<Vec<JoinHandle<()>>>,
    spawned: AtomicUsize,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` without awaiting it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, label: &'static str, url: String, task: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.spawned.fetch_add(1, Ordering::Relaxed);

        let handle = tokio::spawn(async move {
            if let Err(err) = task.await {
                tracing::warn!(task = label, url = %url, error = %err, "background task failed");
            }
        });

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Total tasks spawned since creation.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every task spawned so far.
    pub async fn drain(&self) {
        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "background task panicked or was cancelled");
            }
        }
    }
}
