//! Command-line interface for operating the engine against its store.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

/// Oversight approval workflow engine.
#[derive(Parser)]
#[command(name = "vigil", version, about)]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to a config file (defaults to the .vigil/ hierarchy).
    #[arg(long, global = true, env = "VIGIL_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and run migrations.
    Init,
    /// Admit a proposed action for oversight.
    Admit(commands::AdmitArgs),
    /// Record a reviewer decision.
    Decide(commands::DecideArgs),
    /// Cancel a pending request.
    Cancel(commands::CancelArgs),
    /// Show one request with its decisions.
    Show(commands::ShowArgs),
    /// List open requests.
    List(commands::ListArgs),
    /// Show the audit trail for a request.
    History(commands::ShowArgs),
    /// Sync quorum/auto-approval/escalation policies from a YAML file.
    PolicySync(commands::PolicySyncArgs),
    /// Run the escalation monitor loop.
    Monitor,
}

/// Print an error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json: bool) {
    if json {
        let body = serde_json::json!({ "error": err.to_string() });
        eprintln!("{body}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
