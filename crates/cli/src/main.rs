//! Parley CLI, the main entry point.
//!
//! Commands:
//! - `run`      Hold a conversation (new, or resume the saved one)
//! - `history`  List saved agent states
//! - `init`     Write a starter `parley.toml`

use clap::{Parser, Subcommand};
use parley_cli::commands;
use parley_cli::RunOverrides;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley: round-robin conversations between AI models",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = parley_config::CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conversation
    Run {
        /// Override the number of turns
        #[arg(short, long)]
        turns: Option<usize>,

        /// Continue (or start) the conversation with this id
        #[arg(long)]
        conversation_id: Option<String>,

        /// Opening message for this run
        #[arg(long)]
        topic: Option<String>,

        /// Start a new conversation even if saved state exists
        #[arg(long)]
        new: bool,

        /// Skip markdown export for this run
        #[arg(long)]
        no_export: bool,
    },

    /// List saved agent states
    History,

    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            turns,
            conversation_id,
            topic,
            new,
            no_export,
        } => {
            let overrides = RunOverrides {
                turns,
                conversation_id,
                topic,
                new,
                no_export,
            };
            commands::run::run(&cli.config, overrides).await?
        }
        Commands::History => commands::history::run(&cli.config).await?,
        Commands::Init => commands::init::run(&cli.config).await?,
    }

    Ok(())
}
