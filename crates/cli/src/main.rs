//! infraprobe CLI - Main Entry Point
//!
//! Probes HTTP endpoints with bounded retries and runs deployment
//! scenarios that provision, probe and tear down Terraform stacks.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use commands::{config, probe, scenario};
use infraprobe_common::InfraprobeConfig;

/// infraprobe - readiness probing for freshly provisioned infrastructure
#[derive(Parser)]
#[command(name = "infraprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (default: ~/.infraprobe/config.toml)
    #[arg(long, global = true, env = "INFRAPROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a URL until the response satisfies an expectation
    Probe(probe::ProbeArgs),

    /// Run or list deployment scenarios
    #[command(subcommand)]
    Scenario(scenario::ScenarioCommands),

    /// Inspect or create the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(infraprobe_common::default_config_path);

    let passed = match cli.command {
        Commands::Probe(args) => {
            let config = InfraprobeConfig::load(&config_path)?;
            probe::execute(args, &config, cli.format).await?
        }
        Commands::Scenario(cmd) => {
            let config = InfraprobeConfig::load(&config_path)?;
            scenario::execute(cmd, config, cli.format).await?
        }
        Commands::Config(cmd) => {
            let config = match &cmd {
                config::ConfigCommands::Init { .. } => InfraprobeConfig::default(),
                _ => InfraprobeConfig::load(&config_path)?,
            };
            config::execute(cmd, &config, &config_path)?;
            true
        }
        Commands::Version => {
            println!("infraprobe v{}", infraprobe_common::VERSION);
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }

    Ok(())
}
