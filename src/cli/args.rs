//! CLI argument definitions using clap
//!
//! Commands:
//! - rmdb-harness run [--config <path>] [overrides]
//! - rmdb-harness plan [--config <path>] [--rows N] [--clients n]
//! - rmdb-harness reset [--config <path>] [--storage-dir D] [--work-dir D]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{HarnessConfig, ReadinessPolicy, VerifyPolicy};
use crate::errors::HarnessResult;

/// rmdb-harness - concurrency and crash-recovery check for rmdb
#[derive(Parser, Debug)]
#[command(name = "rmdb-harness")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load, kill, restart and verify the server
    Run(ConfigArgs),

    /// Print the workload without starting anything
    Plan(ConfigArgs),

    /// Remove the server storage directory
    Reset(ConfigArgs),
}

/// Config file plus per-field overrides
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Path to a JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Ids per stage (N)
    #[arg(long)]
    pub rows: Option<u64>,

    /// Concurrent clients in phase 1 (n)
    #[arg(long)]
    pub clients: Option<usize>,

    #[arg(long)]
    pub server_bin: Option<PathBuf>,

    #[arg(long)]
    pub client_bin: Option<PathBuf>,

    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Working directory of every spawned process
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub verify: Option<VerifyPolicy>,

    #[arg(long, value_enum)]
    pub readiness: Option<ReadinessPolicy>,
}

impl ConfigArgs {
    /// File (or defaults) with flags applied on top, validated
    pub fn resolve(&self) -> HarnessResult<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::load(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(rows) = self.rows {
            config.rows = rows;
        }
        if let Some(clients) = self.clients {
            config.clients = clients;
        }
        if let Some(path) = &self.server_bin {
            config.server_bin = path.clone();
        }
        if let Some(path) = &self.client_bin {
            config.client_bin = path.clone();
        }
        if let Some(path) = &self.storage_dir {
            config.storage_dir = path.clone();
        }
        if let Some(path) = &self.work_dir {
            config.work_dir = Some(path.clone());
        }
        if let Some(verify) = self.verify {
            config.verify = verify;
        }
        if let Some(readiness) = self.readiness {
            config.readiness = readiness;
        }

        config.validate()?;
        Ok(config)
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
