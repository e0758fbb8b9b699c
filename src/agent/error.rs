//! Agent error types

use thiserror::Error;

/// Error types for agent operations
///
/// None of these abort a run: a failed fix request leaves the artifact
/// unchanged and the loop moves on to its next iteration.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Unusable response: {0}")]
    Unusable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
