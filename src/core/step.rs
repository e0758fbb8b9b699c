//! Step abstraction

use crate::core::{error::PipelineError, state::PipelineState};
use async_trait::async_trait;

/// One state-mutating operation of a loop iteration
///
/// Expected failures (a build that does not compile, a manifest that does not
/// apply) are recorded in the state. Returning `Err` aborts the whole run and is
/// reserved for configuration problems and cancellation.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in logs and events
    fn name(&self) -> &str;

    /// Run the step against the shared state
    async fn run(&self, state: &mut PipelineState) -> Result<(), PipelineError>;
}

/// A step that does nothing
///
/// Useful as a placeholder in a caller-assembled step list.
#[derive(Debug, Clone)]
pub struct NoopStep {
    name: String,
}

impl NoopStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Step for NoopStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _state: &mut PipelineState) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// Ordered list of steps forming one iteration
pub type StepList = Vec<Box<dyn Step>>;
