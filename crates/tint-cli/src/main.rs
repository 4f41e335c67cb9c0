//! Tint CLI - Command-line interface for Tint
//!
//! Builds the compiled theme once, or keeps it up to date while theme
//! sources are edited.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "tint")]
#[command(author = "Tint Contributors")]
#[command(version)]
#[command(about = "Keeps a compiled theme in sync with its JSON sources", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter tint.config.json
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Regenerate the theme once
    Build {
        /// Config file (defaults to ./tint.config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Regenerate the theme, then keep it in sync until Ctrl+C
    Watch {
        /// Config file (defaults to ./tint.config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the quiescence delay in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Show configured sources and records missing identifiers
    Status {
        /// Config file (defaults to ./tint.config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Build { config } => commands::build(config.as_deref()),
        Commands::Watch {
            config,
            debounce_ms,
        } => commands::watch(config.as_deref(), debounce_ms.map(Duration::from_millis)).await,
        Commands::Status { config } => commands::status(config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
