//! HRDesk CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the web UI and HTTP API
//! - `chat`: Interactive terminal chat
//! - `ask`: Ask one question and print the answer
//! - `doctor`: Check knowledge file, credential and provider
//! - `init`: Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "hrdesk",
    about = "HRDesk — HR knowledge-base assistant backed by a hosted LLM",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.hrdesk/config.toml)
    #[arg(short, long, global = true, env = "HRDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web UI and HTTP API
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat in the terminal
    Chat,

    /// Ask a single question
    Ask {
        /// The question
        question: String,
    },

    /// Diagnose the setup
    Doctor {
        /// Also send a health request to the provider
        #[arg(long)]
        ping: bool,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Chat => commands::chat::run(config_path).await?,
        Commands::Ask { question } => commands::ask::run(config_path, &question).await?,
        Commands::Doctor { ping } => commands::doctor::run(config_path, ping).await?,
        Commands::Init { force } => commands::init::run(config_path, force)?,
    }

    Ok(())
}
