//! CLI definitions for JobSync.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// JobSync CLI.
#[derive(Parser)]
#[command(name = "jobsync")]
#[command(about = "Keeps cron jobs in sync with a desired-state definition table")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the scheduler in foreground (default)
    Run,

    /// List job definitions
    List {
        /// Only show definitions owned by this node
        #[arg(long)]
        node: Option<String>,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Add a job definition
    Add {
        /// Implementation id the definition binds to
        implementation_id: String,

        /// Cron expression
        #[arg(long)]
        cron: String,

        /// Definition id (random when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Display name (defaults to the implementation id)
        #[arg(long)]
        name: Option<String>,

        /// Owning node (defaults to this node)
        #[arg(long)]
        node: Option<String>,

        /// Create the definition disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Enable a job definition
    Enable {
        /// Definition id
        id: String,
    },

    /// Disable a job definition
    Disable {
        /// Definition id
        id: String,
    },

    /// Change or clear the cron expression of a job definition
    SetCron {
        /// Definition id
        id: String,

        /// New cron expression; omit to clear it
        expression: Option<String>,
    },

    /// Remove a job definition
    Remove {
        /// Definition id
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::parse_from(["jobsync"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("config/default.toml"));
    }

    #[test]
    fn test_parse_add() {
        let cli = Cli::parse_from([
            "jobsync",
            "add",
            "echo",
            "--cron",
            "0 0 2 * * ?",
            "--id",
            "nightly-echo",
            "--disabled",
        ]);
        match cli.command {
            Some(Commands::Add {
                implementation_id,
                cron,
                id,
                name,
                node,
                disabled,
            }) => {
                assert_eq!(implementation_id, "echo");
                assert_eq!(cron, "0 0 2 * * ?");
                assert_eq!(id.as_deref(), Some("nightly-echo"));
                assert!(name.is_none());
                assert!(node.is_none());
                assert!(disabled);
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn test_parse_set_cron_without_expression() {
        let cli = Cli::parse_from(["jobsync", "--config", "/etc/jobsync.toml", "set-cron", "A"]);
        assert_eq!(cli.config, PathBuf::from("/etc/jobsync.toml"));
        match cli.command {
            Some(Commands::SetCron { id, expression }) => {
                assert_eq!(id, "A");
                assert!(expression.is_none());
            }
            _ => panic!("expected set-cron"),
        }
    }
}
