//! Bounded worker pool shared by the resolution and install phases

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::DirectorError;
use crate::sink::{ErrorRecord, ErrorSink, Severity};

/// Runs whole phases of tasks with at most `size` of them in flight
#[derive(Debug)]
pub struct TaskPool {
    semaphore: Arc<Semaphore>,
    size: usize,
    shutdown_grace: Duration,
}

impl TaskPool {
    pub fn new(size: usize, shutdown_grace: Duration) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
            shutdown_grace,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Submit every task, then wait until all of them have finished.
    ///
    /// A task that panics is turned into a SEVERE record; its siblings keep running.
    pub async fn run_all<I, F>(&self, tasks: I, sink: &ErrorSink)
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = JoinSet::new();
        for task in tasks {
            let semaphore = self.semaphore.clone();
            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                task.await;
            });
        }

        debug!("Waiting for {} tasks", set.len());
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                sink.record_and_log(
                    ErrorRecord::new(Severity::Severe, "An exception occurred while performing asynchronous work")
                        .with_cause(DirectorError::TaskFailed { reason: e.to_string() }),
                );
            }
        }
    }

    /// Wait for outstanding work to drain; overrunning the grace period only warns
    pub async fn shutdown(&self) {
        let permits = u32::try_from(self.size).unwrap_or(u32::MAX);
        match tokio::time::timeout(self.shutdown_grace, self.semaphore.acquire_many(permits)).await {
            Ok(Ok(_all)) => debug!("Worker pool drained"),
            Ok(Err(_closed)) => debug!("Worker pool already closed"),
            Err(_) => warn!("Worker pool did not shut down within {:?}", self.shutdown_grace),
        }
        self.semaphore.close();
    }
}
