//! Config Commands

use anyhow::{Context, Result};
use clap::Subcommand;
use infraprobe_common::InfraprobeConfig;
use std::path::Path;

use crate::output::{print_success, print_warning};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn execute(cmd: ConfigCommands, config: &InfraprobeConfig, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
            println!("# {}", path.display());
            print!("{}", rendered);
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                print_warning(&format!("{} already exists (use --force to overwrite)", path.display()));
                return Ok(());
            }
            InfraprobeConfig::default()
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Wrote {}", path.display()));
        }
    }
    Ok(())
}
