//! First-start registration of definitions.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::definition::JobDefinition;
use crate::error::StoreResult;
use crate::handle::JobHandle;
use crate::registry::ImplementationRegistry;
use crate::store::DefinitionStore;

/// Outcome of [`register_defaults`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub inserted: usize,
    pub existing: usize,
    pub failed: usize,
}

/// Insert a default definition for every registered implementation that has
/// none yet. Existing rows are never modified.
pub async fn register_defaults(
    store: &dyn DefinitionStore,
    registry: &ImplementationRegistry,
    node: &str,
) -> RegistrationReport {
    let mut report = RegistrationReport::default();

    for handle in registry.handles() {
        match register_one(store, &handle, node).await {
            Ok(true) => report.inserted += 1,
            Ok(false) => report.existing += 1,
            Err(e) => {
                warn!(
                    "Failed to register default definition for '{}': {}",
                    handle.implementation_id(),
                    e
                );
                report.failed += 1;
            }
        }
    }

    info!(
        "Registration: {} inserted, {} existing, {} failed",
        report.inserted, report.existing, report.failed
    );
    report
}

async fn register_one(
    store: &dyn DefinitionStore,
    handle: &JobHandle,
    node: &str,
) -> StoreResult<bool> {
    let implementation_id = handle.implementation_id();
    if let Some(existing) = store.find_by_implementation(implementation_id).await? {
        debug!(
            "Implementation '{}' already has definition '{}'",
            implementation_id, existing.id
        );
        return Ok(false);
    }

    let job = handle.job();
    let id = job
        .default_definition_id()
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut definition =
        JobDefinition::new(id, implementation_id, node).with_display_name(handle.name());
    definition.cron_expression = job.default_cron().map(str::to_string);

    store.upsert(&definition).await?;
    info!(
        "Registered definition '{}' for '{}' on node {}",
        definition.id, implementation_id, node
    );
    Ok(true)
}
