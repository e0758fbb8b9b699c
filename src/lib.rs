//! containerize - build and deploy a repository, repairing failures with an AI agent

pub mod agent;
pub mod cli;
pub mod core;
pub mod execution;
pub mod tooling;

// Re-export commonly used types
pub use agent::{AgentError, ArtifactKind, FixAgent, FixRequest, SubprocessAgent};
pub use core::{PipelineError, PipelineState, Step};
pub use execution::{ContainerizeEngine, ExecutionEvent, RunReport, RunStatus};
