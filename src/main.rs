//! JobSync - desired-state cron scheduler
//!
//! Main entry point for the JobSync scheduler and operator CLI.

mod cli;
mod cmd_definitions;
mod cmd_run;
mod jobs;
mod signal;

use clap::Parser;
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use jobsync_config::{ConfigLoader, ConfigValidator, LoggingConfig};

use crate::cli::{Cli, Commands};
use crate::cmd_definitions::handle_definition_command;
use crate::cmd_run::run_scheduler;

fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Console layer (human-readable text format with colors)
    let console = fmt::layer().with_target(true).with_ansi(true);

    // File layer (daily rotation, text format without colors)
    let file = match &config.dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("jobsync")
                .filename_suffix("log")
                .max_log_files(30)
                .build(log_dir)?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Keep the writer alive for the program duration
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_missing = !cli.config.exists();
    let config = ConfigLoader::load_or_default(&cli.config)?;
    init_tracing(&config.logging)?;

    if config_missing {
        warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
    }
    for warning in ConfigValidator::validate(&config).into_result()? {
        warn!("Config {}: {}", warning.path, warning.message);
    }

    match cli.command {
        None | Some(Commands::Run) => run_scheduler(config).await,
        Some(command) => handle_definition_command(command, &config).await,
    }
}
