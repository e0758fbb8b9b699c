//! Bounded fix requests shared by both loops

use crate::agent::{AgentError, FixAgent, FixRequest};
use crate::execution::events::{EventBus, ExecutionEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Issues fix requests with a per-call timeout and a retry ceiling
///
/// The ceiling bounds agent failures inside one loop iteration; the loop's
/// own budget bounds build and deploy failures.
#[derive(Clone)]
pub struct Fixer {
    agent: Arc<dyn FixAgent>,
    timeout: Duration,
    retries: usize,
    events: EventBus,
}

impl Fixer {
    pub fn new(agent: Arc<dyn FixAgent>, timeout: Duration, retries: usize) -> Self {
        Self {
            agent,
            timeout,
            retries: retries.max(1),
            events: EventBus::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Ask for corrected content for `artifact`
    ///
    /// Returns the last error once every attempt has failed.
    pub async fn request(&self, artifact: &str, request: &FixRequest) -> Result<String, AgentError> {
        let mut last_error = AgentError::Internal("no fix attempt made".to_string());

        for attempt in 1..=self.retries {
            info!(
                "Requesting fix for {} (attempt {}/{})",
                artifact, attempt, self.retries
            );

            let result = timeout(self.timeout, self.agent.request_fix(request))
                .await
                .unwrap_or_else(|_| Err(AgentError::Timeout(self.timeout.as_secs())));

            match result {
                Ok(content) => {
                    self.events.emit(ExecutionEvent::FixApplied {
                        artifact: artifact.to_string(),
                    });
                    return Ok(content);
                }
                Err(e) => {
                    warn!("Fix request for {} failed: {}", artifact, e);
                    last_error = e;
                }
            }
        }

        self.events.emit(ExecutionEvent::FixFailed {
            artifact: artifact.to_string(),
            error: last_error.to_string(),
        });
        Err(last_error)
    }
}

impl std::fmt::Debug for Fixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixer")
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}
