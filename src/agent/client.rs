//! Agent client configuration

use crate::core::config::AgentConfig;

/// Configuration for the subprocess agent client
#[derive(Debug, Clone)]
pub struct AgentClientConfig {
    /// Path to the agent executable
    pub command: String,

    /// Arguments placed before the prompt
    pub args: Vec<String>,

    /// Timeout for a single request in seconds
    pub timeout_secs: u64,
}

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default(), 300)
    }
}

impl AgentClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the run configuration's agent section
    pub fn from_config(config: &AgentConfig, timeout_secs: u64) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout_secs,
        }
    }

    pub fn with_command(mut self, command: String) -> Self {
        self.command = command;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
