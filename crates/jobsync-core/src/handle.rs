//! Job implementations and the non-reentrant handle that wraps them.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::error::ExecutionError;

/// A job implementation that definitions can bind to.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable implementation identifier referenced by definitions.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Cron expression used when the job is first registered in the store.
    fn default_cron(&self) -> Option<&str> {
        None
    }

    /// Preferred definition id for the registration row.
    fn default_definition_id(&self) -> Option<&str> {
        None
    }

    /// Run the job body.
    async fn execute(&self) -> anyhow::Result<()>;
}

/// State of a [`ReentrancyGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GuardState {
    Idle = 0,
    Running = 1,
}

/// `Idle -> Running -> Idle` state machine. Entering is a compare-and-set,
/// so two concurrent callers can never both observe `Idle`.
#[derive(Debug)]
pub struct ReentrancyGuard {
    state: AtomicU8,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(GuardState::Idle as u8),
        }
    }

    /// Current state.
    pub fn state(&self) -> GuardState {
        match self.state.load(Ordering::Acquire) {
            0 => GuardState::Idle,
            _ => GuardState::Running,
        }
    }

    /// Try to move from `Idle` to `Running`. The returned permit moves the
    /// guard back to `Idle` when dropped, including during unwinding.
    pub fn try_enter(&self) -> Option<RunningPermit<'_>> {
        self.state
            .compare_exchange(
                GuardState::Idle as u8,
                GuardState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| RunningPermit { guard: self })
    }
}

impl Default for ReentrancyGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof that the guard is in `Running`.
#[derive(Debug)]
pub struct RunningPermit<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for RunningPermit<'_> {
    fn drop(&mut self) {
        self.guard
            .state
            .store(GuardState::Idle as u8, Ordering::Release);
    }
}

/// Result of a successful [`JobHandle::execute`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The body ran to completion.
    Completed,
    /// Another execution of the same implementation was in flight.
    Skipped,
}

/// Wraps one job implementation. Shared by every scheduled task bound to it,
/// so at most one body of a given implementation runs at a time.
pub struct JobHandle {
    job: Arc<dyn Job>,
    guard: ReentrancyGuard,
}

impl JobHandle {
    pub fn new(job: Arc<dyn Job>) -> Self {
        Self {
            job,
            guard: ReentrancyGuard::new(),
        }
    }

    pub fn implementation_id(&self) -> &str {
        self.job.id()
    }

    pub fn name(&self) -> &str {
        self.job.name()
    }

    pub fn job(&self) -> &Arc<dyn Job> {
        &self.job
    }

    /// Whether a body is currently executing.
    pub fn is_running(&self) -> bool {
        self.guard.state() == GuardState::Running
    }

    /// Run the job unless it is already running. Errors and panics from the
    /// body are converted into [`ExecutionError`]; the guard is released on
    /// every path.
    pub async fn execute(&self) -> Result<ExecutionOutcome, ExecutionError> {
        let Some(_permit) = self.guard.try_enter() else {
            debug!("Job '{}' is already running, skipping", self.implementation_id());
            return Ok(ExecutionOutcome::Skipped);
        };

        match AssertUnwindSafe(self.job.execute()).catch_unwind().await {
            Ok(Ok(())) => Ok(ExecutionOutcome::Completed),
            Ok(Err(e)) => Err(ExecutionError::Failed {
                implementation_id: self.implementation_id().to_string(),
                message: format!("{:#}", e),
            }),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!("Job '{}' panicked: {}", self.implementation_id(), message);
                Err(ExecutionError::Panicked {
                    implementation_id: self.implementation_id().to_string(),
                    message,
                })
            }
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("implementation_id", &self.implementation_id())
            .field("name", &self.name())
            .field("state", &self.guard.state())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
