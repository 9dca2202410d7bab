//! CLI for the TDM magnet download manager.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tdm_core::config;

use commands::{run_config, run_serve, run_sweep};

/// Top-level CLI for the TDM download manager.
#[derive(Debug, Parser)]
#[command(name = "tdm")]
#[command(about = "TDM: magnet-link download manager with bounded concurrency", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the scheduler, the retention sweeper and the HTTP API.
    Serve {
        /// Listen address (overrides `bind` in config.toml).
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
        /// Artifact directory (overrides `download_dir` in config.toml).
        #[arg(long, value_name = "PATH")]
        dir: Option<PathBuf>,
    },

    /// Run one retention pass over the artifact directory.
    Sweep {
        /// Artifact directory (overrides `download_dir` in config.toml).
        #[arg(long, value_name = "PATH")]
        dir: Option<PathBuf>,
    },

    /// Print the effective configuration and where it was loaded from.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Serve { bind, dir } => run_serve(&cfg, bind, dir).await?,
            CliCommand::Sweep { dir } => run_sweep(&cfg, dir).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
