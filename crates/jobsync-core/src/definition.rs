//! Job definition rows and the change-detection key derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the desired-state table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Stable primary key, immutable once created.
    pub id: String,
    /// Which registered job implementation this row binds to.
    pub implementation_id: String,
    /// Human-readable label.
    pub display_name: String,
    /// Cron schedule. `None` or blank means "do not schedule".
    pub cron_expression: Option<String>,
    /// Disabled rows are never scheduled.
    pub enabled: bool,
    /// Only the owning node reconciles this row.
    pub owner_node: String,
    /// Written back after every execution.
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl JobDefinition {
    /// Create an enabled definition without a schedule.
    pub fn new(
        id: impl Into<String>,
        implementation_id: impl Into<String>,
        owner_node: impl Into<String>,
    ) -> Self {
        let implementation_id = implementation_id.into();
        Self {
            id: id.into(),
            display_name: implementation_id.clone(),
            implementation_id,
            cron_expression: None,
            enabled: true,
            owner_node: owner_node.into(),
            last_executed_at: None,
        }
    }

    /// Set the cron expression.
    pub fn with_cron(mut self, cron_expression: impl Into<String>) -> Self {
        self.cron_expression = Some(cron_expression.into());
        self
    }

    /// Set the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set enabled state.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The cron expression, if present and not blank.
    pub fn schedule(&self) -> Option<&str> {
        self.cron_expression
            .as_deref()
            .map(str::trim)
            .filter(|expr| !expr.is_empty())
    }

    /// Key used for change detection. Excludes `last_executed_at` so that
    /// execution write-backs never look like a configuration change.
    pub fn snapshot_key(&self) -> SnapshotKey {
        SnapshotKey {
            owner_node: self.owner_node.clone(),
            implementation_id: self.implementation_id.clone(),
            display_name: self.display_name.clone(),
            enabled: self.enabled,
            cron_expression: self.cron_expression.clone(),
            id: self.id.clone(),
        }
    }
}

/// The fields of a [`JobDefinition`] that matter for scheduling.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotKey {
    pub owner_node: String,
    pub implementation_id: String,
    pub display_name: String,
    pub enabled: bool,
    pub cron_expression: Option<String>,
    pub id: String,
}

/// Point-in-time copy of the desired state, compared as a multiset of
/// [`SnapshotKey`]s (row order does not matter, duplicates do).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    keys: Vec<SnapshotKey>,
}

impl Snapshot {
    /// Build a snapshot from the rows returned by the store.
    pub fn of(definitions: &[JobDefinition]) -> Self {
        let mut keys: Vec<SnapshotKey> = definitions.iter().map(JobDefinition::snapshot_key).collect();
        keys.sort();
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
