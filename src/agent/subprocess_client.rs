//! Agent CLI subprocess client - runs the agent in print mode

use crate::agent::{AgentClientConfig, AgentError};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Client for executing an agent CLI as a subprocess
#[derive(Debug, Clone)]
pub struct SubprocessClient {
    /// Agent executable
    command: String,

    /// Arguments placed before the prompt
    args: Vec<String>,

    /// Timeout for command execution in seconds
    timeout_secs: u64,
}

impl SubprocessClient {
    pub fn new(config: AgentClientConfig) -> Self {
        Self {
            command: config.command,
            args: config.args,
            timeout_secs: config.timeout_secs,
        }
    }

    /// Get the agent executable path
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Execute a prompt through the agent subprocess
    ///
    /// Runs `<command> <args...> <prompt>` and captures stdout.
    ///
    /// # Errors
    /// Returns `AgentError` if:
    /// - The executable cannot be spawned
    /// - It exits with a non-zero status
    /// - The output is not valid UTF-8
    /// - The command times out
    pub async fn execute(&self, prompt: &str) -> Result<String, AgentError> {
        debug!(
            "Spawning {} subprocess with prompt length: {}",
            self.command,
            prompt.len()
        );

        let timeout_duration = Duration::from_secs(self.timeout_secs);

        let result = timeout(
            timeout_duration,
            Command::new(&self.command)
                .args(&self.args)
                .arg(prompt)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| AgentError::Timeout(self.timeout_secs))?;

        let output = result.map_err(|e| {
            AgentError::Internal(format!("Failed to execute {}: {}", self.command, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("{} exited with code {}: {}", self.command, exit_code, stderr.trim());
            return Err(AgentError::Api(format!(
                "{} exited with code {}: {}",
                self.command,
                exit_code,
                stderr.trim()
            )));
        }

        let content = String::from_utf8(output.stdout).map_err(|e| {
            AgentError::Internal(format!("Failed to decode {} output: {}", self.command, e))
        })?;

        debug!("{} returned {} bytes of output", self.command, content.len());

        Ok(content)
    }
}
