//! CLI command definitions

use crate::core::config::{ConfigOverrides, StrategyKind};
use clap::Args;
use std::path::PathBuf;

/// Containerize and deploy a repository
#[derive(Debug, Args, Clone, Default)]
pub struct RunCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Image reference to build
    #[arg(long)]
    pub image: Option<String>,

    /// Registry to push the image to
    #[arg(long)]
    pub registry: Option<String>,

    /// Maximum Dockerfile build-and-fix iterations
    #[arg(long)]
    pub max_build_iterations: Option<usize>,

    /// Maximum Kubernetes deploy-and-fix iterations
    #[arg(long)]
    pub max_deploy_iterations: Option<usize>,

    /// Manifest apply strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Also write artifacts that converged when the run fails
    #[arg(long)]
    pub best_effort: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate configuration and manifests without building anything
#[derive(Debug, Args, Clone, Default)]
pub struct ValidateCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Print the repository description given to the agent
#[derive(Debug, Args, Clone, Default)]
pub struct ScanCommand {
    /// Repository root
    #[arg(short, long)]
    pub repo: Option<PathBuf>,
}

/// Where the repository and its artifacts live
#[derive(Debug, Args, Clone, Default)]
pub struct TargetArgs {
    /// Repository root
    #[arg(short, long)]
    pub repo: Option<PathBuf>,

    /// Dockerfile path, relative to the repository
    #[arg(long)]
    pub dockerfile: Option<PathBuf>,

    /// Manifest directory, relative to the repository
    #[arg(long)]
    pub manifests: Option<PathBuf>,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Sequential => StrategyKind::Sequential,
            StrategyArg::Parallel => StrategyKind::Parallel,
            StrategyArg::ParallelLimited => StrategyKind::ParallelLimited,
        }
    }
}

impl TargetArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            repository: self.repo.clone(),
            dockerfile: self.dockerfile.clone(),
            manifest_dir: self.manifests.clone(),
            ..Default::default()
        }
    }
}

impl RunCommand {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            image: self.image.clone(),
            registry: self.registry.clone(),
            max_build_iterations: self.max_build_iterations,
            max_deploy_iterations: self.max_deploy_iterations,
            strategy: self.strategy.map(StrategyKind::from),
            best_effort: self.best_effort,
            ..self.target.overrides()
        }
    }
}
