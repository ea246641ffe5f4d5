//! Nodex CLI
//!
//! Command-line tools for Nodex index configurations.
//!
//! # Commands
//!
//! - `inspect` - Display the fields and index names of a configuration
//! - `replay` - Replay change events through a registry and query the result

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Nodex index tools.
#[derive(Parser)]
#[command(name = "nodex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the index configuration (JSON)
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display indexed fields and derived index names
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Replay change events (one JSON object per line) and report index contents
    Replay {
        /// Events file
        #[arg(short, long)]
        events: PathBuf,

        /// Index type to query (exact, fulltext)
        #[arg(short, long, default_value = "exact")]
        index: String,

        /// Field to query
        #[arg(long)]
        field: Option<String>,

        /// Exact term to match
        #[arg(long)]
        term: Option<String>,

        /// Text whose tokens must all match
        #[arg(long)]
        text: Option<String>,

        /// Term prefix to match
        #[arg(long)]
        prefix: Option<String>,

        /// Inclusive lower bound for a numeric range
        #[arg(long)]
        min: Option<f64>,

        /// Inclusive upper bound for a numeric range
        #[arg(long)]
        max: Option<f64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let config = cli.config.ok_or("Index config path required for inspect")?;
            commands::inspect::run(&config, &format)?;
        }
        Commands::Replay {
            events,
            index,
            field,
            term,
            text,
            prefix,
            min,
            max,
            format,
        } => {
            let config = cli.config.ok_or("Index config path required for replay")?;
            let query = commands::replay::QueryArgs {
                index,
                field,
                term,
                text,
                prefix,
                min,
                max,
            };
            commands::replay::run(&config, &events, &query, &format)?;
        }
        Commands::Version => {
            println!("Nodex CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Nodex Core v{}", nodex_core::VERSION);
        }
    }

    Ok(())
}
