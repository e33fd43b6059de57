//! Live scheduled tasks.
//!
//! Each task is a plain binding `{id, cron_expression, implementation_id}`
//! plus one timer task that emits a [`Firing`] on every cron tick. Timers do
//! not run job bodies; the dispatcher resolves the binding at fire time.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::ParseError;
use crate::schedule::{next_fire_after, parse_schedule};

/// What a scheduled task is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskBinding {
    pub id: String,
    pub cron_expression: String,
    pub implementation_id: String,
}

/// Emitted by a timer when its cron time is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Firing {
    pub id: String,
    /// Registration generation of the timer that fired. A firing whose
    /// generation no longer matches the live task is stale.
    pub generation: u64,
    pub scheduled_at: DateTime<Utc>,
}

/// Observation handle for one registration. Cancellation goes through
/// [`TaskSet::cancel`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    id: String,
    generation: u64,
    token: CancellationToken,
}

impl CancelHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether this registration has been cancelled or replaced.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

struct ScheduledTask {
    binding: TaskBinding,
    generation: u64,
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl ScheduledTask {
    fn stop(self) {
        self.token.cancel();
        // The timer exits on its own once it observes the token. Dropping the
        // join handle detaches it.
        drop(self.timer);
    }
}

/// The live mapping from definition id to its scheduled task.
pub struct TaskSet {
    tasks: Mutex<HashMap<String, ScheduledTask>>,
    next_generation: AtomicU64,
    firings: mpsc::UnboundedSender<Firing>,
    shutdown: CancellationToken,
}

impl TaskSet {
    /// Create an empty task set and the receiving end of its firing channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Firing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task_set = Self {
            tasks: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            firings: tx,
            shutdown: CancellationToken::new(),
        };
        (task_set, rx)
    }

    /// Register a periodic timer for `binding.id`.
    ///
    /// Fails only if the cron expression cannot be parsed, in which case
    /// nothing is registered. An existing registration under the same id is
    /// cancelled first, so at most one timer per id is ever live.
    pub fn add(&self, binding: TaskBinding) -> Result<CancelHandle, ParseError> {
        let schedule = parse_schedule(&binding.cron_expression)?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();

        let handle = CancelHandle {
            id: binding.id.clone(),
            generation,
            token: token.clone(),
        };

        let mut tasks = self.tasks.lock();
        let timer = tokio::spawn(run_timer(
            binding.id.clone(),
            generation,
            schedule,
            token.clone(),
            self.firings.clone(),
        ));

        debug!(
            "Scheduled task '{}' ({}) with cron '{}', generation {}",
            binding.id, binding.implementation_id, binding.cron_expression, generation
        );

        let previous = tasks.insert(
            binding.id.clone(),
            ScheduledTask {
                binding,
                generation,
                token,
                timer,
            },
        );
        if let Some(previous) = previous {
            previous.stop();
        }

        Ok(handle)
    }

    /// Cancel future firings of `id`. Unknown ids are a no-op.
    ///
    /// Does not wait for or interrupt an execution that is already running.
    /// Returns whether a task was removed.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = self.tasks.lock().remove(id);
        match removed {
            Some(task) => {
                debug!("Cancelled task '{}' (generation {})", id, task.generation);
                task.stop();
                true
            }
            None => false,
        }
    }

    /// Ids currently scheduled.
    pub fn snapshot(&self) -> BTreeSet<String> {
        self.tasks.lock().keys().cloned().collect()
    }

    /// Current binding and generation for `id`.
    pub fn binding(&self, id: &str) -> Option<(TaskBinding, u64)> {
        self.tasks
            .lock()
            .get(id)
            .map(|task| (task.binding.clone(), task.generation))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Cancel every task. Later `add` calls register timers that are
    /// cancelled immediately.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let drained: Vec<_> = self.tasks.lock().drain().map(|(_, task)| task).collect();
        let count = drained.len();
        for task in drained {
            task.stop();
        }
        debug!("TaskSet shut down, {} task(s) cancelled", count);
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_timer(
    id: String,
    generation: u64,
    schedule: Schedule,
    token: CancellationToken,
    firings: mpsc::UnboundedSender<Firing>,
) {
    let mut last: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        // Never compute a fire time at or before the previous one, even if
        // the sleep woke slightly early relative to the wall clock.
        let after = match last {
            Some(last) if last > now => last,
            _ => now,
        };

        let Some(next) = next_fire_after(&schedule, after) else {
            debug!("Task '{}' has no upcoming fire time", id);
            return;
        };

        let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            _ = token.cancelled() => {
                trace!("Timer for '{}' generation {} stopped", id, generation);
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        last = Some(next);
        trace!("Task '{}' fired for {}", id, next.to_rfc3339());

        let firing = Firing {
            id: id.clone(),
            generation,
            scheduled_at: next,
        };
        if firings.send(firing).is_err() {
            debug!("Firing channel closed, stopping timer for '{}'", id);
            return;
        }
    }
}

#[cfg(test)]
#[path = "task_set_tests.rs"]
mod tests;
