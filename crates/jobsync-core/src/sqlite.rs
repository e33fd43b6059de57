//! SQLite definition store.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::definition::JobDefinition;
use crate::error::{StoreError, StoreResult};
use crate::store::DefinitionStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_definitions (
    id                TEXT    NOT NULL PRIMARY KEY,
    implementation_id TEXT    NOT NULL,
    display_name      TEXT    NOT NULL,
    cron_expression   TEXT,
    enabled           INTEGER NOT NULL DEFAULT 1,
    owner_node        TEXT    NOT NULL,
    last_executed_at  TEXT,
    created_at        TEXT    NOT NULL,
    updated_at        TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_job_definitions_owner ON job_definitions(owner_node);
CREATE INDEX IF NOT EXISTS idx_job_definitions_impl ON job_definitions(implementation_id);
"#;

const COLUMNS: &str =
    "id, implementation_id, display_name, cron_expression, enabled, owner_node, last_executed_at";

/// Initialize the definition schema.
pub fn init_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

fn row_to_definition(row: &Row<'_>) -> rusqlite::Result<JobDefinition> {
    let last_executed_at: Option<String> = row.get(6)?;
    let last_executed_at = last_executed_at
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))
        })
        .transpose()?;

    Ok(JobDefinition {
        id: row.get(0)?,
        implementation_id: row.get(1)?,
        display_name: row.get(2)?,
        cron_expression: row.get(3)?,
        enabled: row.get(4)?,
        owner_node: row.get(5)?,
        last_executed_at,
    })
}

/// Definition store backed by a SQLite `job_definitions` table.
pub struct SqliteDefinitionStore {
    conn: Connection,
}

impl SqliteDefinitionStore {
    /// Open (or create) a file-backed store.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Connection(format!("Failed to create {:?}: {}", parent, e))
            })?;
        }

        let conn = Connection::open(&path)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::init(conn, &path.display().to_string()).await
    }

    /// Create a store backed by an in-memory database.
    pub async fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::init(conn, ":memory:").await
    }

    async fn init(conn: Connection, location: &str) -> StoreResult<Self> {
        conn.call(|conn| Ok(init_schema(conn)?)).await?;
        debug!("SqliteDefinitionStore initialized at {}", location);
        Ok(Self { conn })
    }

    async fn query_definitions(
        &self,
        sql: String,
        arg: Option<String>,
    ) -> StoreResult<Vec<JobDefinition>> {
        let definitions = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = match arg {
                    Some(arg) => stmt.query_map([arg], row_to_definition)?,
                    None => stmt.query_map([], row_to_definition)?,
                };
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;
        Ok(definitions)
    }
}

#[async_trait]
impl DefinitionStore for SqliteDefinitionStore {
    async fn list_for_node(&self, node: &str) -> StoreResult<Vec<JobDefinition>> {
        self.query_definitions(
            format!("SELECT {COLUMNS} FROM job_definitions WHERE owner_node = ?1 ORDER BY id"),
            Some(node.to_string()),
        )
        .await
    }

    async fn list_all(&self) -> StoreResult<Vec<JobDefinition>> {
        self.query_definitions(
            format!("SELECT {COLUMNS} FROM job_definitions ORDER BY id"),
            None,
        )
        .await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<JobDefinition>> {
        let id = id.to_string();
        let definition = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {COLUMNS} FROM job_definitions WHERE id = ?1"),
                        [id],
                        row_to_definition,
                    )
                    .optional()?)
            })
            .await?;
        Ok(definition)
    }

    async fn find_by_implementation(
        &self,
        implementation_id: &str,
    ) -> StoreResult<Option<JobDefinition>> {
        let mut definitions = self
            .query_definitions(
                format!(
                    "SELECT {COLUMNS} FROM job_definitions WHERE implementation_id = ?1 ORDER BY id LIMIT 1"
                ),
                Some(implementation_id.to_string()),
            )
            .await?;
        Ok(definitions.pop())
    }

    async fn upsert(&self, definition: &JobDefinition) -> StoreResult<()> {
        let definition = definition.clone();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO job_definitions
                     (id, implementation_id, display_name, cron_expression, enabled,
                      owner_node, last_executed_at, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                     ON CONFLICT(id) DO UPDATE SET
                        implementation_id = excluded.implementation_id,
                        display_name      = excluded.display_name,
                        cron_expression   = excluded.cron_expression,
                        enabled           = excluded.enabled,
                        owner_node        = excluded.owner_node,
                        last_executed_at  = excluded.last_executed_at,
                        updated_at        = excluded.updated_at",
                    params![
                        definition.id,
                        definition.implementation_id,
                        definition.display_name,
                        definition.cron_expression,
                        definition.enabled,
                        definition.owner_node,
                        definition.last_executed_at.map(|t| t.to_rfc3339()),
                        now,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM job_definitions WHERE id = ?1", [id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn record_execution(
        &self,
        id: &str,
        executed_at: DateTime<Utc>,
        enabled: Option<bool>,
    ) -> StoreResult<()> {
        let key = id.to_string();
        let executed_at = executed_at.to_rfc3339();
        let updated = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE job_definitions
                     SET last_executed_at = ?2,
                         enabled = COALESCE(?3, enabled),
                         updated_at = ?2
                     WHERE id = ?1",
                    params![key, executed_at, enabled],
                )?)
            })
            .await?;

        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
