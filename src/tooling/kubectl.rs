//! kubectl manifest applier

use crate::core::{manifest::declared_namespace, state::ResourceRef};
use crate::tooling::{process::run_tool, ManifestApplier, ToolError, ToolOutcome};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Applies manifests with `kubectl apply -f -` and waits on rollouts
#[derive(Debug, Clone)]
pub struct KubectlCli {
    program: String,
    namespace: Option<String>,
    apply_timeout: Duration,
    ready_timeout: Duration,
}

impl KubectlCli {
    pub fn new(apply_timeout: Duration, ready_timeout: Duration) -> Self {
        Self {
            program: "kubectl".to_string(),
            namespace: None,
            apply_timeout,
            ready_timeout,
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, namespace: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(ns) = namespace.or(self.namespace.as_deref()) {
            cmd.arg("--namespace").arg(ns);
        }
        cmd
    }
}

#[async_trait]
impl ManifestApplier for KubectlCli {
    async fn apply(&self, manifest: &str) -> Result<ToolOutcome, ToolError> {
        // kubectl rejects a --namespace that contradicts the manifest
        let mut cmd = self.command(declared_namespace(manifest).as_deref());
        cmd.arg("apply").arg("-f").arg("-");
        run_tool(cmd, &self.program, Some(manifest), self.apply_timeout).await
    }

    async fn check_ready(&self, resource: &ResourceRef) -> Result<ToolOutcome, ToolError> {
        debug!("Waiting for rollout of {}", resource.qualified_name());

        let mut cmd = self.command(resource.namespace.as_deref());
        cmd.arg("rollout")
            .arg("status")
            .arg(resource.qualified_name())
            .arg(format!("--timeout={}s", self.ready_timeout.as_secs()));

        // Leave kubectl room to report its own timeout before we kill it
        let limit = self.ready_timeout + Duration::from_secs(10);
        run_tool(cmd, &self.program, None, limit).await
    }
}
