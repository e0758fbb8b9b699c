//! Prompt rendering and response cleanup for fix requests

use crate::agent::AgentError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which artifact a request is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Dockerfile,
    Manifest,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Dockerfile => write!(f, "Dockerfile"),
            ArtifactKind::Manifest => write!(f, "Kubernetes manifest"),
        }
    }
}

/// Everything the agent sees when asked to repair (or draft) an artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixRequest {
    pub kind: ArtifactKind,

    /// Current artifact text; empty asks for a first draft
    pub content: String,

    /// Failure output of the most recent attempt
    pub error_text: String,

    /// Repository tree description
    pub repository_tree: String,

    /// Another artifact the fix should stay consistent with
    pub related: Option<String>,
}

impl FixRequest {
    pub fn new(kind: ArtifactKind, content: &str, error_text: &str, repository_tree: &str) -> Self {
        Self {
            kind,
            content: content.to_string(),
            error_text: error_text.to_string(),
            repository_tree: repository_tree.to_string(),
            related: None,
        }
    }

    pub fn with_related(mut self, related: &str) -> Self {
        self.related = Some(related.to_string());
        self
    }

    /// A request with no content to repair
    pub fn is_draft(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Render the prompt sent to the agent
pub fn render(request: &FixRequest) -> String {
    if request.is_draft() {
        return render_draft(request);
    }

    let mut prompt = format!(
        "Please fix this {} that is failing.\n\n\
         Repository structure:\n{}\n\n\
         Current {}:\n{}\n\n\
         Error output:\n{}\n",
        request.kind,
        request.repository_tree.trim_end(),
        request.kind,
        request.content.trim_end(),
        request.error_text.trim_end(),
    );

    if let Some(related) = &request.related {
        let label = match request.kind {
            ArtifactKind::Manifest => "Dockerfile used to build the image",
            ArtifactKind::Dockerfile => "Related file",
        };
        prompt.push_str(&format!("\n{}:\n{}\n", label, related.trim_end()));
    }

    prompt.push_str(match request.kind {
        ArtifactKind::Dockerfile => {
            "\nProvide a corrected Dockerfile that:\n\
             1. Fixes the specific error mentioned\n\
             2. Uses appropriate base images for the repository's language and framework\n\
             3. Installs dependencies the build needs\n\
             4. Uses multi-stage builds when appropriate\n"
        }
        ArtifactKind::Manifest => {
            "\nProvide a corrected manifest that:\n\
             1. Fixes the specific error mentioned\n\
             2. Keeps the same kind and metadata.name\n\
             3. References the image built from the Dockerfile above\n\
             4. Includes probes and resource limits where they apply\n"
        }
    });

    prompt.push_str(&format!(
        "\nReturn ONLY the corrected {} content without any explanation or markdown formatting.",
        request.kind
    ));
    prompt
}

fn render_draft(request: &FixRequest) -> String {
    format!(
        "Write a {} for this repository.\n\n\
         Repository structure:\n{}\n\n\
         Return ONLY the {} content without any explanation or markdown formatting.",
        request.kind,
        request.repository_tree.trim_end(),
        request.kind,
    )
}

/// Extract usable artifact text from raw agent output
///
/// If the output contains a fenced code block, its body is used. Output that
/// is empty after cleanup is rejected.
pub fn clean_response(raw: &str) -> Result<String, AgentError> {
    let fence = Regex::new(r"(?s)```[A-Za-z0-9_.+-]*[ \t]*\r?\n(.*?)```")
        .map_err(|e| AgentError::Internal(format!("Invalid fence pattern: {}", e)))?;

    let cleaned = match fence.captures(raw).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim(),
        None => raw.trim(),
    };

    if cleaned.is_empty() {
        return Err(AgentError::Unusable("agent returned no content".to_string()));
    }

    Ok(format!("{}\n", cleaned))
}
