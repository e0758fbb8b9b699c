//! AI agent used to draft and repair artifacts

pub mod client;
pub mod error;
pub mod prompt;
pub mod subprocess_client;

use async_trait::async_trait;
pub use client::AgentClientConfig;
pub use error::AgentError;
pub use prompt::{clean_response, ArtifactKind, FixRequest};
pub use subprocess_client::SubprocessClient;
use tracing::debug;

/// Trait for fix requests - allows for different implementations
#[async_trait]
pub trait FixAgent: Send + Sync {
    /// Return corrected artifact content for the request
    async fn request_fix(&self, request: &FixRequest) -> Result<String, AgentError>;
}

/// Agent that calls an agent CLI as a subprocess
#[derive(Debug, Clone)]
pub struct SubprocessAgent {
    /// The subprocess client that handles the actual execution
    subprocess_client: SubprocessClient,
}

impl SubprocessAgent {
    pub fn new(config: AgentClientConfig) -> Self {
        Self {
            subprocess_client: SubprocessClient::new(config),
        }
    }
}

#[async_trait]
impl FixAgent for SubprocessAgent {
    async fn request_fix(&self, request: &FixRequest) -> Result<String, AgentError> {
        let prompt = prompt::render(request);
        debug!("Requesting {} fix ({} byte prompt)", request.kind, prompt.len());

        let raw = self.subprocess_client.execute(&prompt).await?;
        clean_response(&raw)
    }
}
