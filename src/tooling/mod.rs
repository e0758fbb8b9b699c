//! External capabilities: image builds, cluster applies, repository scans
//!
//! Each capability is a trait so the loops can be driven by scripted fakes in
//! tests. The command-line implementations live in the submodules.

pub mod docker;
pub mod kubectl;
pub mod process;
pub mod scan;

use crate::core::state::ResourceRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub use docker::DockerCli;
pub use kubectl::KubectlCli;
pub use scan::FileTreeScanner;

/// Errors raised when a tool could not be run at all
///
/// A tool that ran and reported failure is not an error; it yields a
/// `ToolOutcome` with `succeeded == false`.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {secs} seconds")]
    Timeout { program: String, secs: u64 },

    #[error("Cannot scan {path}: {message}")]
    Scan { path: String, message: String },
}

/// Result of one external call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub succeeded: bool,
    pub output: String,
}

impl ToolOutcome {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            output: output.into(),
        }
    }
}

/// Builds and publishes container images
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build `image` from Dockerfile text using `context` as build context
    async fn build(&self, dockerfile: &str, context: &Path, image: &str)
        -> Result<ToolOutcome, ToolError>;

    /// Make a built image pullable under `target`
    async fn publish(&self, image: &str, target: &str) -> Result<ToolOutcome, ToolError>;
}

/// Applies manifests to a cluster and checks workload readiness
#[async_trait]
pub trait ManifestApplier: Send + Sync {
    async fn apply(&self, manifest: &str) -> Result<ToolOutcome, ToolError>;

    async fn check_ready(&self, resource: &ResourceRef) -> Result<ToolOutcome, ToolError>;
}

/// Produces a textual description of a repository for agent context
#[async_trait]
pub trait RepositoryScanner: Send + Sync {
    async fn scan(&self, root: &Path) -> Result<String, ToolError>;
}
