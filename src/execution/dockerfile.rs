//! Dockerfile build-fix loop

use crate::agent::{ArtifactKind, FixRequest};
use crate::core::{error::PipelineError, state::PipelineState, step::Step};
use crate::execution::events::{EventBus, ExecutionEvent};
use crate::execution::fixer::Fixer;
use crate::tooling::ImageBuilder;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Name of the Dockerfile loop in logs and events
pub const LOOP_NAME: &str = "dockerfile";

/// Continue while the most recent build did not succeed
pub fn should_continue(state: &PipelineState) -> bool {
    !state.dockerfile.build_succeeded
}

/// Asks the agent for a first Dockerfile when the repository has none
pub struct DraftDockerfileStep {
    fixer: Fixer,
}

impl DraftDockerfileStep {
    pub fn new(fixer: Fixer) -> Self {
        Self { fixer }
    }
}

#[async_trait]
impl Step for DraftDockerfileStep {
    fn name(&self) -> &str {
        "draft-dockerfile"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        if state.iteration_count > 0 || !state.dockerfile.content.trim().is_empty() {
            return Ok(());
        }

        info!("No Dockerfile found; requesting a draft");
        let request = FixRequest::new(ArtifactKind::Dockerfile, "", "", state.repository_tree());

        match self.fixer.request("Dockerfile", &request).await {
            Ok(content) => state.dockerfile.content = content,
            // The build step reports the empty Dockerfile and the fix step retries the draft
            Err(e) => warn!("Dockerfile draft failed: {}", e),
        }
        Ok(())
    }
}

/// Builds the current Dockerfile
pub struct BuildStep {
    builder: Arc<dyn ImageBuilder>,
    context: PathBuf,
    image: String,
    timeout: Duration,
    events: EventBus,
}

impl BuildStep {
    pub fn new(
        builder: Arc<dyn ImageBuilder>,
        context: PathBuf,
        image: String,
        timeout: Duration,
    ) -> Self {
        Self {
            builder,
            context,
            image,
            timeout,
            events: EventBus::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    async fn attempt(&self, dockerfile: &str) -> Result<(), String> {
        if dockerfile.trim().is_empty() {
            return Err("Dockerfile is empty".to_string());
        }

        match timeout(
            self.timeout,
            self.builder.build(dockerfile, &self.context, &self.image),
        )
        .await
        {
            Ok(Ok(outcome)) if outcome.succeeded => Ok(()),
            Ok(Ok(outcome)) if outcome.output.trim().is_empty() => {
                Err("Build failed without output".to_string())
            }
            Ok(Ok(outcome)) => Err(outcome.output),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "Build timed out after {} seconds",
                self.timeout.as_secs()
            )),
        }
    }
}

#[async_trait]
impl Step for BuildStep {
    fn name(&self) -> &str {
        "build"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        state.dockerfile.build_errors.clear();
        let iteration = state.iteration_count;

        match self.attempt(&state.dockerfile.content).await {
            Ok(()) => {
                info!("Built image {} on iteration {}", self.image, iteration);
                state.dockerfile.build_succeeded = true;
                self.events.emit(ExecutionEvent::BuildSucceeded { iteration });
            }
            Err(output) => {
                warn!("Build failed on iteration {}", iteration);
                state.dockerfile.build_succeeded = false;
                state.dockerfile.build_errors = output.clone();
                self.events.emit(ExecutionEvent::BuildFailed { iteration, output });
            }
        }
        Ok(())
    }
}

/// Replaces a failing Dockerfile with the agent's correction
pub struct FixDockerfileStep {
    fixer: Fixer,
}

impl FixDockerfileStep {
    pub fn new(fixer: Fixer) -> Self {
        Self { fixer }
    }
}

#[async_trait]
impl Step for FixDockerfileStep {
    fn name(&self) -> &str {
        "fix-dockerfile"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        if state.dockerfile.build_succeeded || !state.iterations_remain() {
            return Ok(());
        }

        let request = FixRequest::new(
            ArtifactKind::Dockerfile,
            &state.dockerfile.content,
            &state.dockerfile.build_errors,
            state.repository_tree(),
        );

        match self.fixer.request("Dockerfile", &request).await {
            Ok(content) => state.dockerfile.content = content,
            Err(e) => warn!("Keeping current Dockerfile: {}", e),
        }
        Ok(())
    }
}
