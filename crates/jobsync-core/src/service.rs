//! Service facade wiring the scheduler together.

use std::sync::Arc;

use jobsync_config::SchedulerConfig;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::bootstrap::{RegistrationReport, register_defaults};
use crate::dispatch::Dispatcher;
use crate::gate::ReadinessGate;
use crate::node::NodeIdentity;
use crate::poll::PollLoop;
use crate::reconciler::Reconciler;
use crate::registry::ImplementationRegistry;
use crate::store::DefinitionStore;
use crate::task_set::{Firing, TaskSet};

/// Keeps this node's scheduled jobs in sync with the definition store.
pub struct JobSync {
    store: Arc<dyn DefinitionStore>,
    registry: Arc<ImplementationRegistry>,
    node: Arc<dyn NodeIdentity>,
    tasks: Arc<TaskSet>,
    firings: mpsc::UnboundedReceiver<Firing>,
    dispatcher: Arc<Dispatcher>,
    reconciler: Arc<Reconciler>,
    poll: PollLoop,
    gate: ReadinessGate,
}

impl JobSync {
    pub fn new(
        store: Arc<dyn DefinitionStore>,
        registry: ImplementationRegistry,
        node: Arc<dyn NodeIdentity>,
        config: &SchedulerConfig,
    ) -> Self {
        let registry = Arc::new(registry);
        let (tasks, firings) = TaskSet::new();
        let tasks = Arc::new(tasks);

        let dispatcher = Arc::new(Dispatcher::new(
            tasks.clone(),
            registry.clone(),
            store.clone(),
            config.worker_count,
        ));
        let reconciler = Arc::new(Reconciler::new(tasks.clone(), registry.clone()));
        let poll = PollLoop::new(
            store.clone(),
            node.clone(),
            reconciler.clone(),
            config.poll_interval(),
        );

        Self {
            store,
            registry,
            node,
            tasks,
            firings,
            dispatcher,
            reconciler,
            poll,
            gate: ReadinessGate::new(),
        }
    }

    pub fn node_address(&self) -> &str {
        self.node.current_node_address()
    }

    pub fn registry(&self) -> &Arc<ImplementationRegistry> {
        &self.registry
    }

    pub fn tasks(&self) -> &Arc<TaskSet> {
        &self.tasks
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Opened once the dispatcher is running.
    pub fn readiness(&self) -> ReadinessGate {
        self.gate.clone()
    }

    /// Notify to force an immediate poll.
    pub fn poll_trigger(&self) -> Arc<Notify> {
        self.poll.trigger()
    }

    /// Insert default definitions for implementations that have none.
    pub async fn register_defaults(&self) -> RegistrationReport {
        register_defaults(
            self.store.as_ref(),
            &self.registry,
            self.node.current_node_address(),
        )
        .await
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// On shutdown every timer is cancelled and executions already running
    /// are awaited.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "JobSync starting on node {} with {} implementation(s)",
            self.node.current_node_address(),
            self.registry.len()
        );

        let dispatcher_task =
            self.dispatcher
                .clone()
                .spawn(self.firings, self.gate.clone(), shutdown.child_token());

        self.poll.run(&self.gate, shutdown.clone()).await;

        info!("Stopping scheduler, cancelling {} task(s)", self.tasks.len());
        self.tasks.shutdown();
        shutdown.cancel();
        if let Err(e) = dispatcher_task.await {
            error!("Dispatcher task failed: {}", e);
        }

        self.dispatcher.drain().await;
        info!("JobSync stopped");
    }
}
