//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{RunCommand, ScanCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Build a container image for a repository and deploy it to Kubernetes,
/// repairing failures with an AI agent
#[derive(Debug, Parser, Clone)]
#[command(name = "containerize")]
#[command(version)]
#[command(about = "Iteratively containerize and deploy a repository", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to run configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Build, deploy and repair until both converge
    Run(RunCommand),

    /// Validate configuration and discover manifests
    Validate(ValidateCommand),

    /// Print the repository tree description
    Scan(ScanCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
