//! ComplySync CLI
//!
//! Maintenance tools for a ComplySync data directory.
//!
//! # Commands
//!
//! - `status` - Probe the remote store and show the connection mode
//! - `inspect` - List locally stored records and their sync state
//! - `sync` - Push pending writes to the remote store
//! - `watch` - Follow the connection status, syncing on reconnect

mod commands;

use clap::{Parser, Subcommand};
use complysync_engine::EngineConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ComplySync command-line tools.
#[derive(Parser)]
#[command(name = "complysync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Local data directory (overrides COMPLYSYNC_DATA_DIR)
    #[arg(global = true, short, long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the remote store and show the connection mode
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List locally stored records
    Inspect {
        /// Only this collection
        collection: Option<String>,

        /// Only records waiting for a sync pass
        #[arg(short, long)]
        pending: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Push pending writes to the remote store
    Sync {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Follow the connection status, syncing on reconnect (Ctrl-C to stop)
    Watch,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = EngineConfig::load_with_dotenv()?;
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }

    match cli.command {
        Commands::Status { format } => {
            commands::status::run(&config, &format).await?;
        }
        Commands::Inspect {
            collection,
            pending,
            format,
        } => {
            commands::inspect::run(&config, collection.as_deref(), pending, &format)?;
        }
        Commands::Sync { format } => {
            commands::sync::run(&config, &format).await?;
        }
        Commands::Watch => {
            commands::watch::run(&config).await?;
        }
        Commands::Version => {
            println!("ComplySync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ComplySync Engine v{}", complysync_engine::VERSION);
        }
    }

    Ok(())
}
