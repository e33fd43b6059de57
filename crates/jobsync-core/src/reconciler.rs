//! Desired-state reconciliation.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::definition::JobDefinition;
use crate::error::ReconcileError;
use crate::registry::JobLookup;
use crate::task_set::{TaskBinding, TaskSet};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Tasks cancelled because their definition disappeared.
    pub removed: usize,
    /// Definitions (re)scheduled.
    pub scheduled: usize,
    /// Disabled definitions.
    pub disabled: usize,
    /// Definitions without a cron expression, left untouched.
    pub skipped_no_cron: usize,
    /// Definitions bound to an unregistered implementation.
    pub skipped_unknown_impl: usize,
    /// Definitions whose cron expression failed to parse.
    pub failed: usize,
}

/// Applies a desired-state list to the [`TaskSet`].
///
/// Passes are serialized: a second caller waits until the running pass has
/// finished, so one pass never cancels a task another pass just added.
pub struct Reconciler {
    tasks: Arc<TaskSet>,
    lookup: Arc<dyn JobLookup>,
    serial: Mutex<()>,
}

impl Reconciler {
    pub fn new(tasks: Arc<TaskSet>, lookup: Arc<dyn JobLookup>) -> Self {
        Self {
            tasks,
            lookup,
            serial: Mutex::new(()),
        }
    }

    pub fn tasks(&self) -> &Arc<TaskSet> {
        &self.tasks
    }

    /// Make the task set match `desired`.
    ///
    /// Every enabled definition with a cron expression and a registered
    /// implementation is cancelled and re-added. A failure on one definition
    /// is logged and never stops the rest of the pass.
    pub async fn reconcile(&self, desired: &[JobDefinition]) -> ReconcileReport {
        let _serial = self.serial.lock().await;
        let mut report = ReconcileReport::default();

        let wanted: HashSet<&str> = desired.iter().map(|d| d.id.as_str()).collect();
        for id in self.tasks.snapshot() {
            if !wanted.contains(id.as_str()) && self.tasks.cancel(&id) {
                debug!("Removed task '{}', definition is gone", id);
                report.removed += 1;
            }
        }

        for definition in desired {
            if !definition.enabled {
                if self.tasks.cancel(&definition.id) {
                    debug!("Cancelled disabled task '{}'", definition.id);
                }
                report.disabled += 1;
                continue;
            }

            let Some(cron_expression) = definition.schedule() else {
                debug!(
                    "Definition '{}' has no cron expression, leaving it as is",
                    definition.id
                );
                report.skipped_no_cron += 1;
                continue;
            };

            match self.schedule(definition, cron_expression) {
                Ok(()) => report.scheduled += 1,
                Err(ReconcileError::Lookup(e)) => {
                    warn!("Skipping definition '{}': {}", definition.id, e);
                    report.skipped_unknown_impl += 1;
                }
                Err(ReconcileError::Parse(e)) => {
                    warn!("Skipping definition '{}': {}", definition.id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Reconciled {} definition(s): {} scheduled, {} removed, {} disabled, {} without cron, {} unknown implementation, {} failed",
            desired.len(),
            report.scheduled,
            report.removed,
            report.disabled,
            report.skipped_no_cron,
            report.skipped_unknown_impl,
            report.failed
        );
        report
    }

    /// Replace the task for `definition`. On a parse error the old task
    /// stays removed.
    fn schedule(
        &self,
        definition: &JobDefinition,
        cron_expression: &str,
    ) -> Result<(), ReconcileError> {
        self.lookup.lookup(&definition.implementation_id)?;

        self.tasks.cancel(&definition.id);
        self.tasks.add(TaskBinding {
            id: definition.id.clone(),
            cron_expression: cron_expression.to_string(),
            implementation_id: definition.implementation_id.clone(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
