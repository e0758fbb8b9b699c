//! Docker CLI image builder

use crate::tooling::{process::run_tool, ImageBuilder, ToolError, ToolOutcome};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::info;

/// Builds images with `docker build`, reading the Dockerfile from stdin
///
/// The Dockerfile is never written into the build context, so a failed run
/// leaves the repository untouched.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    build_timeout: Duration,
    publish_timeout: Duration,
}

impl DockerCli {
    pub fn new(build_timeout: Duration) -> Self {
        Self {
            program: "docker".to_string(),
            build_timeout,
            publish_timeout: build_timeout,
        }
    }

    /// Total time allowed for tag plus push
    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    /// Use a different docker-compatible executable (e.g. `podman`)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }
}

#[async_trait]
impl ImageBuilder for DockerCli {
    async fn build(
        &self,
        dockerfile: &str,
        context: &Path,
        image: &str,
    ) -> Result<ToolOutcome, ToolError> {
        info!("Building image {} from {}", image, context.display());

        let mut cmd = self.command();
        cmd.arg("build").arg("-t").arg(image).arg("-f").arg("-").arg(context);

        run_tool(cmd, &self.program, Some(dockerfile), self.build_timeout).await
    }

    async fn publish(&self, image: &str, target: &str) -> Result<ToolOutcome, ToolError> {
        let deadline = Instant::now() + self.publish_timeout;

        if image != target {
            let mut tag = self.command();
            tag.arg("tag").arg(image).arg(target);
            let tagged = run_tool(tag, &self.program, None, self.publish_timeout).await?;
            if !tagged.succeeded {
                return Ok(tagged);
            }
        }

        info!("Pushing image {}", target);
        let mut push = self.command();
        push.arg("push").arg(target);
        let remaining = deadline.saturating_duration_since(Instant::now());
        run_tool(push, &self.program, None, remaining).await
    }
}
