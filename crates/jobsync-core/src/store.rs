//! Definition store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::definition::JobDefinition;
use crate::error::{StoreError, StoreResult};

/// Persisted desired-state table.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// All definitions owned by `node`.
    async fn list_for_node(&self, node: &str) -> StoreResult<Vec<JobDefinition>>;

    /// All definitions.
    async fn list_all(&self) -> StoreResult<Vec<JobDefinition>>;

    /// Load a definition by id.
    async fn get(&self, id: &str) -> StoreResult<Option<JobDefinition>>;

    /// First definition bound to `implementation_id`, if any.
    async fn find_by_implementation(
        &self,
        implementation_id: &str,
    ) -> StoreResult<Option<JobDefinition>>;

    /// Insert or fully replace a definition.
    async fn upsert(&self, definition: &JobDefinition) -> StoreResult<()>;

    /// Delete a definition. Deleting an unknown id is not an error.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Write back an execution result. `enabled` is only updated when set.
    async fn record_execution(
        &self,
        id: &str,
        executed_at: DateTime<Utc>,
        enabled: Option<bool>,
    ) -> StoreResult<()>;
}

/// In-memory definition store.
pub struct MemoryDefinitionStore {
    definitions: RwLock<HashMap<String, JobDefinition>>,
}

impl MemoryDefinitionStore {
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store pre-populated with `definitions`.
    pub fn with_definitions(definitions: impl IntoIterator<Item = JobDefinition>) -> Self {
        let map = definitions
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();
        Self {
            definitions: RwLock::new(map),
        }
    }
}

impl Default for MemoryDefinitionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted(mut definitions: Vec<JobDefinition>) -> Vec<JobDefinition> {
    definitions.sort_by(|a, b| a.id.cmp(&b.id));
    definitions
}

#[async_trait]
impl DefinitionStore for MemoryDefinitionStore {
    async fn list_for_node(&self, node: &str) -> StoreResult<Vec<JobDefinition>> {
        let definitions = self.definitions.read().await;
        Ok(sorted(
            definitions
                .values()
                .filter(|d| d.owner_node == node)
                .cloned()
                .collect(),
        ))
    }

    async fn list_all(&self) -> StoreResult<Vec<JobDefinition>> {
        let definitions = self.definitions.read().await;
        Ok(sorted(definitions.values().cloned().collect()))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<JobDefinition>> {
        let definitions = self.definitions.read().await;
        Ok(definitions.get(id).cloned())
    }

    async fn find_by_implementation(
        &self,
        implementation_id: &str,
    ) -> StoreResult<Option<JobDefinition>> {
        let definitions = self.definitions.read().await;
        Ok(sorted(
            definitions
                .values()
                .filter(|d| d.implementation_id == implementation_id)
                .cloned()
                .collect(),
        )
        .into_iter()
        .next())
    }

    async fn upsert(&self, definition: &JobDefinition) -> StoreResult<()> {
        let mut definitions = self.definitions.write().await;
        definitions.insert(definition.id.clone(), definition.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut definitions = self.definitions.write().await;
        definitions.remove(id);
        Ok(())
    }

    async fn record_execution(
        &self,
        id: &str,
        executed_at: DateTime<Utc>,
        enabled: Option<bool>,
    ) -> StoreResult<()> {
        let mut definitions = self.definitions.write().await;
        let definition = definitions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        definition.last_executed_at = Some(executed_at);
        if let Some(enabled) = enabled {
            definition.enabled = enabled;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
