//! # bastion-cli
//!
//! Command-line interface for Bastion assessment runs.
//!
//! - `bastion init` — scaffold `bastion.toml` and a scope template
//! - `bastion run` — start (or resume) a run in the foreground
//! - `bastion status` / `bastion latest` — inspect runs
//! - `bastion signal` — pause, resume, cancel or update_config a run
//! - `bastion plan` — preview analyzer selection for every phase
//! - `bastion audit tail` — show recent audit records of a run
//! - `bastion schemas export` — write JSON Schemas for run documents

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bastion_config::DEFAULT_CONFIG_FILE;
use bastion_workflow::ControlSignal;

use commands::CliContext;

/// Bastion: safe-by-default, policy-gated security assessments.
#[derive(Parser)]
#[command(name = "bastion", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file and scope template.
    Init {
        /// Overwrite existing files.
        #[arg(long)]
        force: bool,
    },
    /// Run every phase against an authorized staging target.
    Run(commands::run::RunArgs),
    /// Show the state of a run.
    Status {
        #[arg(long, default_value = "default")]
        workspace: String,
        /// Run to inspect (defaults to the latest run in the workspace).
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Print the most recent run id of a workspace.
    Latest {
        #[arg(long, default_value = "default")]
        workspace: String,
    },
    /// Send a control signal (pause, resume, cancel, update_config) to a run.
    Signal {
        signal: ControlSignal,
        #[arg(long, default_value = "default")]
        workspace: String,
        /// Run to signal (defaults to the latest run in the workspace).
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Show which analyzers each phase would run under the configured rules.
    Plan {
        /// Target URL to evaluate the rules against.
        #[arg(long)]
        url: String,
        /// Repository path to evaluate the rules against.
        #[arg(long, default_value = ".")]
        repo: String,
        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Inspect a run's audit logs.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
    /// Work with the JSON Schemas of run documents.
    Schemas {
        #[command(subcommand)]
        command: commands::schemas::SchemaCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("bastion_workflow=info".parse()?)
                .add_directive("bastion_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    // Config is only required by commands that act on runs.
    let context = || CliContext::load(&cli.config);

    match &cli.command {
        Commands::Init { force } => commands::init::execute(&cli.config, *force),
        Commands::Run(args) => commands::run::execute(&context()?, args).await,
        Commands::Status { workspace, run_id } => {
            commands::status::execute(&context()?, workspace, run_id.as_deref())
        }
        Commands::Latest { workspace } => commands::status::latest(&context()?, workspace),
        Commands::Signal {
            signal,
            workspace,
            run_id,
        } => commands::signal::execute(&context()?, *signal, workspace, run_id.as_deref()),
        Commands::Plan { url, repo, json } => {
            commands::plan::execute(&context()?, url, repo, *json)
        }
        Commands::Audit { command } => commands::audit::execute(command, &context()?),
        Commands::Schemas { command } => commands::schemas::execute(command),
    }
}
