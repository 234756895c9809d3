//! PolyDB podcast catalogue
//!
//! A small command-line consumer of the PolyDB engine that keeps a list of
//! podcast feeds and the download settings shared by all of them.
//!
//! # Commands
//!
//! - `add` - Subscribe to a feed
//! - `list` - List subscribed podcasts
//! - `remove` - Unsubscribe a podcast
//! - `settings` - Show or change download settings
//! - `stats` - Display document counts and engine counters

mod commands;
mod error;
mod model;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_PATH: &str = "polydb-data";

/// PolyDB podcast catalogue.
#[derive(Parser)]
#[command(name = "polydb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to a feed
    Add {
        /// Feed URL
        feed_url: String,

        /// Display title (defaults to the feed URL)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// List subscribed podcasts
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Unsubscribe a podcast
    Remove {
        /// Podcast id, as shown by `list`
        id: String,
    },

    /// Show or change download settings
    Settings {
        /// Directory episodes are downloaded into
        #[arg(short, long)]
        download_dir: Option<String>,

        /// Split length in seconds
        #[arg(short, long)]
        split_secs: Option<u64>,

        /// Tempo multiplier
        #[arg(short, long)]
        tempo: Option<f64>,
    },

    /// Display document counts and engine counters
    Stats {
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

    let path = cli.path.unwrap_or_else(|| PathBuf::from(DEFAULT_PATH));

    match cli.command {
        Commands::Add { feed_url, title } => commands::add::run(&path, &feed_url, title)?,
        Commands::List { format } => commands::list::run(&path, &format)?,
        Commands::Remove { id } => commands::remove::run(&path, &id)?,
        Commands::Settings {
            download_dir,
            split_secs,
            tempo,
        } => {
            let change = commands::settings::SettingsChange {
                download_dir,
                split_secs,
                tempo,
            };
            commands::settings::run(&path, change)?;
        }
        Commands::Stats { format } => commands::stats::run(&path, &format)?,
        Commands::Version => {
            println!("PolyDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("PolyDB Core v{}", polydb_core::VERSION);
        }
    }

    Ok(())
}
