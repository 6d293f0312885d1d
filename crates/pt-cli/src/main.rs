//! podtunnel CLI
//!
//! Keeps forward and reverse tunnels into cluster workloads alive while
//! developing against them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podtunnel::commands;
use pt_core::config::{self, DevConfig};

#[derive(Parser)]
#[command(name = "podtunnel")]
#[command(author, version, about = "Development-loop port tunnels into cluster workloads")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "PODTUNNEL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Kube context to use (overrides config)
    #[arg(long, global = true)]
    context: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start all configured tunnels and keep them alive until Ctrl+C
    Run,

    /// Check the configuration and show the resolved port mappings
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let path = cli.config.unwrap_or_else(config::default_config_path);
    let mut config = load(&path)?;
    if let Some(context) = cli.context {
        config.kube.context = Some(context);
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run_command(config).await?,
        Commands::Validate => commands::validate_command(&path, &config)?,
    }

    Ok(())
}

fn load(path: &Path) -> Result<DevConfig> {
    config::load_config(path).with_context(|| format!("Failed to load config from {:?}", path))
}
