//! CLI for the AppHub update engine.

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Result;
use apphub_core::config::{self, UpdaterConfig};
use clap::{Parser, Subcommand};

use commands::{run_check, run_checksum, run_completions, run_manpage, run_status, run_update};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "apphub", version)]
#[command(about = "AppHub: check, download and install application updates", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/apphub/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch the remote manifest and list applications with an update.
    Check {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check, then download, verify and install every available update.
    Update {
        /// Only update these application ids (repeatable).
        #[arg(long = "only", value_name = "ID")]
        only: Vec<String>,
        /// Print the final summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the local catalog: installed version and path per application.
    Status,

    /// Compute SHA-256 of a file (for writing manifest entries).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },

    /// Print a shell completion script.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },

    /// Print the man page (roff).
    Manpage,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let config_path = cli.config;

        match cli.command {
            CliCommand::Check { json } => run_check(load_config(config_path.as_deref())?, json).await?,
            CliCommand::Update { only, json } => {
                run_update(load_config(config_path.as_deref())?, only, json).await?
            }
            CliCommand::Status => run_status(&load_config(config_path.as_deref())?)?,
            CliCommand::Checksum { path } => run_checksum(&path).await?,
            CliCommand::Completions { shell } => run_completions(shell)?,
            CliCommand::Manpage => run_manpage()?,
        }

        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<UpdaterConfig> {
    let cfg = match path {
        Some(path) => config::load_from(path)?,
        None => config::load_or_init()?,
    };
    tracing::debug!("loaded config: {:?}", cfg);
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests;
