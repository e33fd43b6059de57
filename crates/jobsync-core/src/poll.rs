//! Poll-and-diff loop.
//!
//! Fetches this node's definitions on a fixed interval and reconciles only
//! when the snapshot changed. `last_executed_at` is not part of the snapshot,
//! so execution write-backs never cause a pass.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::definition::Snapshot;
use crate::gate::ReadinessGate;
use crate::node::NodeIdentity;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::store::DefinitionStore;

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Snapshot equal to the previous one; no pass was run.
    Unchanged,
    /// Snapshot changed and a pass was run.
    Reconciled(ReconcileReport),
    /// The store could not be read. The previous snapshot is kept.
    FetchFailed,
}

pub struct PollLoop {
    store: Arc<dyn DefinitionStore>,
    node: Arc<dyn NodeIdentity>,
    reconciler: Arc<Reconciler>,
    interval: Duration,
    // `None` until the first successful fetch, so the first tick always
    // reconciles.
    last: Mutex<Option<Snapshot>>,
    trigger: Arc<Notify>,
}

impl PollLoop {
    pub fn new(
        store: Arc<dyn DefinitionStore>,
        node: Arc<dyn NodeIdentity>,
        reconciler: Arc<Reconciler>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            node,
            reconciler,
            interval: interval.max(Duration::from_millis(1)),
            last: Mutex::new(None),
            trigger: Arc::new(Notify::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Handle that forces an immediate tick when notified.
    pub fn trigger(&self) -> Arc<Notify> {
        self.trigger.clone()
    }

    /// Fetch, compare and reconcile if needed.
    pub async fn tick(&self) -> TickOutcome {
        let node = self.node.current_node_address();
        let desired = match self.store.list_for_node(node).await {
            Ok(desired) => desired,
            Err(e) => {
                warn!("Failed to fetch definitions for node {}: {}", node, e);
                return TickOutcome::FetchFailed;
            }
        };

        let snapshot = Snapshot::of(&desired);
        {
            let mut last = self.last.lock();
            if last.as_ref() == Some(&snapshot) {
                debug!("Definitions for node {} unchanged ({} rows)", node, snapshot.len());
                return TickOutcome::Unchanged;
            }
            *last = Some(snapshot);
        }

        info!("Definitions for node {} changed, reconciling", node);
        TickOutcome::Reconciled(self.reconciler.reconcile(&desired).await)
    }

    /// Run until `shutdown` is cancelled. Waits for `gate` before the first
    /// tick, which then runs immediately.
    pub async fn run(&self, gate: &ReadinessGate, shutdown: CancellationToken) {
        tokio::select! {
            _ = gate.wait() => {}
            _ = shutdown.cancelled() => return,
        }

        info!(
            "Poll loop started for node {} (interval {:?})",
            self.node.current_node_address(),
            self.interval
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Poll loop shutting down");
                    break;
                }
                _ = interval.tick() => {}
                _ = self.trigger.notified() => {
                    debug!("Poll triggered");
                    interval.reset();
                }
            }
            self.tick().await;
        }
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
