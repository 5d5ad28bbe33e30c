//! # Annex Guard CLI (`annexg`)
//!
//! ## Usage
//!
//! ```bash
//! annexg --config ./config/annexg.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `annexg analyze [TEXT]` | Classify an ingredient list (argument, `--file`, or stdin) |
//! | `annexg peek` | Show dataset version, counts, and a sample of entries |
//! | `annexg serve` | Start the HTTP job server |
//!
//! ## Examples
//!
//! ```bash
//! annexg analyze "Aqua, Glycerin, Hydroquinone"
//! annexg analyze --file label.txt --origin ocr --json
//! annexg peek --limit 5 --json
//! cat label.txt | annexg analyze
//! RUST_LOG=annex_guard_core=debug annexg serve
//! ```
//!
//! Logs go to stderr and are filtered by `RUST_LOG`; stdout carries only
//! command output.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use annex_guard::{analyze, config, peek, server};

const DEFAULT_LOG_FILTER: &str = "annex_guard=info,annex_guard_core=info";

/// Annex Guard CLI — screen cosmetic ingredient lists against the EU
/// Annex II prohibited substances list.
#[derive(Parser)]
#[command(
    name = "annexg",
    about = "Annex Guard — screen cosmetic ingredient lists against EU Annex II",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/annexg.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an ingredient list.
    ///
    /// Reads TEXT, the file given by `--file`, or stdin when it is piped.
    /// Exits with status 1 when the analysis fails (empty list, unsupported
    /// origin, input too long).
    Analyze {
        /// Comma-separated ingredient list.
        text: Option<String>,

        /// Read the list from a file instead.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Where the text came from: `text` or `ocr`.
        #[arg(long, default_value = "text")]
        origin: String,

        /// Print the full job as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show an overview of the configured dataset.
    Peek {
        /// Number of entries to list.
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Print the overview as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Analyze {
            text,
            file,
            origin,
            json,
        } => {
            let input = analyze::read_input(text, file.as_deref())?;
            analyze::run_analyze(&cfg, input, &origin, json).await?;
        }
        Commands::Peek { limit, json } => {
            peek::run_peek(&cfg, limit, json)?;
        }
        Commands::Serve => {
            server::run_server(&cli.config, &cfg).await?;
        }
    }

    Ok(())
}
