//! Fire-time dispatch.
//!
//! Turns [`Firing`]s from the task set into job executions. The binding is
//! looked up when the timer fires, never captured when the task is added,
//! so a replaced definition always runs with its current implementation.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::ExecutionError;
use crate::gate::ReadinessGate;
use crate::handle::{ExecutionOutcome, JobHandle};
use crate::registry::JobLookup;
use crate::store::DefinitionStore;
use crate::task_set::{Firing, TaskSet};

/// Join handle of one dispatched execution.
pub type ExecutionHandle = JoinHandle<Result<ExecutionOutcome, ExecutionError>>;

/// Runs job bodies off the timer path, bounded by a worker count.
pub struct Dispatcher {
    tasks: Arc<TaskSet>,
    lookup: Arc<dyn JobLookup>,
    store: Arc<dyn DefinitionStore>,
    workers: Arc<Semaphore>,
    worker_count: usize,
    executions: TaskTracker,
}

impl Dispatcher {
    pub fn new(
        tasks: Arc<TaskSet>,
        lookup: Arc<dyn JobLookup>,
        store: Arc<dyn DefinitionStore>,
        worker_count: usize,
    ) -> Self {
        let worker_count = worker_count.max(1);
        Self {
            tasks,
            lookup,
            store,
            workers: Arc::new(Semaphore::new(worker_count)),
            worker_count,
            executions: TaskTracker::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of idle workers.
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Execute the job currently bound to `id`.
    ///
    /// Returns `None` if `id` is not scheduled or its implementation is not
    /// registered. The execution runs on its own task; the caller never
    /// waits for the body.
    pub fn fire(&self, id: &str) -> Option<ExecutionHandle> {
        let (binding, _) = self.tasks.binding(id)?;
        let handle = match self.lookup.lookup(&binding.implementation_id) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Cannot fire task '{}': {}", id, e);
                return None;
            }
        };

        Some(self.executions.spawn(execute_and_record(
            binding.id,
            handle,
            self.store.clone(),
            self.workers.clone(),
        )))
    }

    /// Wait until every execution spawned so far has finished, including
    /// ones still waiting for a worker.
    pub async fn drain(&self) {
        self.executions.close();
        let pending = self.executions.len();
        if pending > 0 {
            debug!("Waiting for {} execution(s) to finish", pending);
        }
        self.executions.wait().await;
    }

    /// Dispatch a timer firing. Firings from a replaced or cancelled
    /// registration are dropped.
    pub fn dispatch(&self, firing: &Firing) -> Option<ExecutionHandle> {
        match self.tasks.binding(&firing.id) {
            Some((_, generation)) if generation == firing.generation => self.fire(&firing.id),
            _ => {
                debug!(
                    "Dropping stale firing for '{}' (generation {})",
                    firing.id, firing.generation
                );
                None
            }
        }
    }

    /// Consume firings until `shutdown` is cancelled or the channel closes.
    /// Opens `gate` once the loop is running.
    pub fn spawn(
        self: Arc<Self>,
        mut firings: mpsc::UnboundedReceiver<Firing>,
        gate: ReadinessGate,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Dispatcher started with {} worker(s)", self.worker_count);
            gate.open();

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Dispatcher shutting down");
                        break;
                    }
                    firing = firings.recv() => {
                        match firing {
                            Some(firing) => {
                                // Detached: the execution reports through the store.
                                let _ = self.dispatch(&firing);
                            }
                            None => {
                                debug!("Firing channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }
}

async fn execute_and_record(
    id: String,
    handle: Arc<JobHandle>,
    store: Arc<dyn DefinitionStore>,
    workers: Arc<Semaphore>,
) -> Result<ExecutionOutcome, ExecutionError> {
    // Skip before queueing for a worker; `execute` re-checks atomically.
    if handle.is_running() {
        debug!(
            "Task '{}' skipped, '{}' is already running",
            id,
            handle.implementation_id()
        );
        return Ok(ExecutionOutcome::Skipped);
    }

    let _permit = match workers.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            return Err(ExecutionError::Failed {
                implementation_id: handle.implementation_id().to_string(),
                message: format!("worker pool closed: {}", e),
            });
        }
    };

    debug!("Executing task '{}' ({})", id, handle.implementation_id());
    let result = handle.execute().await;
    let executed_at = Utc::now();

    let disable = match &result {
        Ok(ExecutionOutcome::Skipped) => return result,
        Ok(ExecutionOutcome::Completed) => {
            debug!("Task '{}' completed", id);
            None
        }
        Err(e) => {
            error!("Task '{}' failed, disabling definition: {}", id, e);
            Some(false)
        }
    };

    if let Err(e) = store.record_execution(&id, executed_at, disable).await {
        warn!("Failed to record execution of '{}': {}", id, e);
    }

    result
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
