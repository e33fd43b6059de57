//! Operator subcommands that edit the definition table.

use anyhow::{Context, bail};
use jobsync_config::{Config, StoreBackend};
use jobsync_core::{DefinitionStore, JobDefinition, parse_schedule, resolve_node_address};
use tracing::info;
use uuid::Uuid;

use crate::cli::Commands;
use crate::cmd_run::open_store;

/// Handle definition subcommands.
pub(crate) async fn handle_definition_command(
    command: Commands,
    config: &Config,
) -> anyhow::Result<()> {
    if config.store.backend == StoreBackend::Memory {
        bail!("Definition commands need a persistent store; set [store] backend = \"sqlite\"");
    }
    let store = open_store(&config.store).await?;
    let store = store.as_ref();

    match command {
        Commands::List { node, format } => {
            let definitions = list(store, node.as_deref()).await?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&definitions)?),
                _ => print!("{}", format_table(&definitions)),
            }
            Ok(())
        }
        Commands::Add {
            implementation_id,
            cron,
            id,
            name,
            node,
            disabled,
        } => {
            let node = node.unwrap_or_else(|| resolve_node_address(config.node.address.as_deref()));
            let definition = JobDefinition::new(
                id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                implementation_id,
                node,
            )
            .with_cron(cron)
            .with_enabled(!disabled);
            let definition = match name {
                Some(name) => definition.with_display_name(name),
                None => definition,
            };
            add(store, definition).await
        }
        Commands::Enable { id } => set_enabled(store, &id, true).await,
        Commands::Disable { id } => set_enabled(store, &id, false).await,
        Commands::SetCron { id, expression } => set_cron(store, &id, expression).await,
        Commands::Remove { id } => remove(store, &id).await,
        Commands::Run => bail!("'run' is not a definition command"),
    }
}

async fn list(store: &dyn DefinitionStore, node: Option<&str>) -> anyhow::Result<Vec<JobDefinition>> {
    let definitions = match node {
        Some(node) => store.list_for_node(node).await?,
        None => store.list_all().await?,
    };
    Ok(definitions)
}

async fn add(store: &dyn DefinitionStore, definition: JobDefinition) -> anyhow::Result<()> {
    if let Some(cron) = definition.schedule() {
        parse_schedule(cron)?;
    }
    if store.get(&definition.id).await?.is_some() {
        bail!("Definition '{}' already exists", definition.id);
    }

    store.upsert(&definition).await?;
    info!(
        "Added definition '{}' ({}) on node {}",
        definition.id, definition.implementation_id, definition.owner_node
    );
    println!("{}", definition.id);
    Ok(())
}

async fn load(store: &dyn DefinitionStore, id: &str) -> anyhow::Result<JobDefinition> {
    store
        .get(id)
        .await?
        .with_context(|| format!("Definition '{}' not found", id))
}

async fn set_enabled(store: &dyn DefinitionStore, id: &str, enabled: bool) -> anyhow::Result<()> {
    let definition = load(store, id).await?.with_enabled(enabled);
    store.upsert(&definition).await?;
    info!(
        "Definition '{}' {}",
        id,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

async fn set_cron(
    store: &dyn DefinitionStore,
    id: &str,
    expression: Option<String>,
) -> anyhow::Result<()> {
    if let Some(expression) = &expression {
        parse_schedule(expression)?;
    }

    let mut definition = load(store, id).await?;
    definition.cron_expression = expression;
    store.upsert(&definition).await?;
    match &definition.cron_expression {
        Some(cron) => info!("Definition '{}' now runs on '{}'", id, cron),
        None => info!("Definition '{}' cron expression cleared", id),
    }
    Ok(())
}

async fn remove(store: &dyn DefinitionStore, id: &str) -> anyhow::Result<()> {
    load(store, id).await?;
    store.delete(id).await?;
    info!("Removed definition '{}'", id);
    Ok(())
}

fn format_table(definitions: &[JobDefinition]) -> String {
    if definitions.is_empty() {
        return "No definitions found.\n".to_string();
    }

    let mut out = format!(
        "{:<38} {:<16} {:<20} {:<8} {:<16} {}\n",
        "ID", "IMPLEMENTATION", "CRON", "ENABLED", "NODE", "LAST RUN"
    );
    out.push_str(&"-".repeat(120));
    out.push('\n');
    for definition in definitions {
        let last_run = definition
            .last_executed_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<38} {:<16} {:<20} {:<8} {:<16} {}\n",
            definition.id,
            definition.implementation_id,
            definition.cron_expression.as_deref().unwrap_or("-"),
            definition.enabled,
            definition.owner_node,
            last_run
        ));
    }
    out
}
