//! `jobsync run`: the scheduler process.

use std::sync::Arc;

use jobsync_config::{Config, StoreBackend, StoreConfig};
use jobsync_core::{
    CancellationToken, DefinitionStore, JobSync, MemoryDefinitionStore, SqliteDefinitionStore,
    StaticNode, resolve_node_address,
};
use tracing::{info, warn};

use crate::jobs::builtin_registry;
use crate::signal::SignalHandler;

/// Open the configured definition store.
pub(crate) async fn open_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn DefinitionStore>> {
    match config.backend {
        StoreBackend::Sqlite => {
            let store = SqliteDefinitionStore::open(&config.path).await?;
            info!("Definition store: {}", config.path.display());
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Definition store is in memory; definitions are lost on exit");
            Ok(Arc::new(MemoryDefinitionStore::new()))
        }
    }
}

/// Run the scheduler in foreground until SIGINT/SIGTERM.
pub(crate) async fn run_scheduler(config: Config) -> anyhow::Result<()> {
    info!("Starting JobSync v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config.store).await?;
    let node = resolve_node_address(config.node.address.as_deref());
    info!("Node address: {}", node);

    let service = JobSync::new(
        store,
        builtin_registry(),
        Arc::new(StaticNode::new(node)),
        &config.scheduler,
    );
    service.register_defaults().await;

    let shutdown = CancellationToken::new();
    SignalHandler::new(shutdown.clone(), service.poll_trigger()).install()?;

    info!(
        "Polling every {:?} with {} worker(s)",
        config.scheduler.poll_interval(),
        config.scheduler.worker_count
    );
    service.run(shutdown).await;
    Ok(())
}
