//! Run state shared by every step of a containerization run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use uuid::Uuid;

/// Metadata key holding the full image reference the build produced
pub const IMAGE_KEY: &str = "image";

/// Metadata key holding the registry the image is pushed to
pub const REGISTRY_KEY: &str = "registry";

/// The Dockerfile being built and repaired
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerfileArtifact {
    /// Current Dockerfile text
    pub content: String,

    /// Where the Dockerfile is written on success (fixed at initialization)
    pub path: PathBuf,

    /// Output of the most recent failed build, empty after a successful one
    pub build_errors: String,

    /// Whether the most recent build attempt succeeded
    pub build_succeeded: bool,
}

impl DockerfileArtifact {
    pub fn new(content: String, path: PathBuf) -> Self {
        Self {
            content,
            path,
            build_errors: String::new(),
            build_succeeded: false,
        }
    }
}

/// Identifies a Kubernetes object for readiness polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceRef {
    /// `kind/name` as understood by kubectl
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.kind.to_lowercase(), self.name)
    }
}

/// A single manifest and its deployment status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Stable key derived from the file name
    pub name: String,

    /// Current manifest text
    pub content: String,

    /// Where the manifest is written on success (fixed at discovery)
    pub path: PathBuf,

    /// Object described by the manifest, when it could be parsed
    pub resource: Option<ResourceRef>,

    /// Workload that must also pass a readiness check
    pub is_deployment_type: bool,

    /// Applied and, for workloads, ready
    pub is_deployed: bool,

    /// Failure text of the most recent attempt
    pub error_log: String,

    /// Number of apply attempts made so far
    pub attempts: u32,
}

impl ManifestRecord {
    pub fn new(name: String, content: String, path: PathBuf) -> Self {
        Self {
            name,
            content,
            path,
            resource: None,
            is_deployment_type: false,
            is_deployed: false,
            error_log: String::new(),
            attempts: 0,
        }
    }
}

/// Mutable record threaded through every step of one run
///
/// Owned by exactly one run; steps receive it by `&mut` and never share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Unique run ID, used to correlate log lines
    pub run_id: Uuid,

    /// When the run was created
    pub started_at: DateTime<Utc>,

    /// Textual description of the repository, passed to the agent as context
    repository_tree: String,

    /// The Dockerfile artifact
    pub dockerfile: DockerfileArtifact,

    /// Manifests keyed by name; iteration is always in name order
    pub manifests: BTreeMap<String, ManifestRecord>,

    /// True only after the final convergence check of both loops
    success: bool,

    /// Index of the current iteration of the running loop
    pub iteration_count: usize,

    /// Iteration budget of the running loop, written by the executor
    pub max_iterations: usize,

    /// Auxiliary values such as the image reference or registry
    pub metadata: HashMap<String, String>,
}

impl PipelineState {
    /// Create the state for a run
    pub fn new(repository_tree: String, dockerfile: DockerfileArtifact) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            repository_tree,
            dockerfile,
            manifests: BTreeMap::new(),
            success: false,
            iteration_count: 0,
            max_iterations: 1,
            metadata: HashMap::new(),
        }
    }

    /// Add a manifest, replacing any previous record with the same name
    pub fn with_manifest(mut self, manifest: ManifestRecord) -> Self {
        self.manifests.insert(manifest.name.clone(), manifest);
        self
    }

    pub fn repository_tree(&self) -> &str {
        &self.repository_tree
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Record the outcome of a final convergence check
    pub(crate) fn set_success(&mut self, success: bool) {
        self.success = success;
    }

    /// Whether another iteration follows the current one
    pub fn iterations_remain(&self) -> bool {
        self.iteration_count + 1 < self.max_iterations
    }

    /// Manifests not yet deployed, in name order
    pub fn pending_manifests(&self) -> impl Iterator<Item = &ManifestRecord> {
        self.manifests.values().filter(|m| !m.is_deployed)
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Per-manifest status snapshot in name order
    pub fn manifest_statuses(&self) -> Vec<ManifestStatus> {
        self.manifests
            .values()
            .map(|m| ManifestStatus {
                name: m.name.clone(),
                path: m.path.clone(),
                deployed: m.is_deployed,
                attempts: m.attempts,
                error: (!m.error_log.is_empty()).then(|| m.error_log.clone()),
            })
            .collect()
    }
}

/// True only when there is at least one manifest and every one is deployed
pub fn all_manifests_deployed(manifests: &BTreeMap<String, ManifestRecord>) -> bool {
    !manifests.is_empty() && manifests.values().all(|m| m.is_deployed)
}

/// Deployment status of one manifest, as reported to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestStatus {
    pub name: String,
    pub path: PathBuf,
    pub deployed: bool,
    pub attempts: u32,
    pub error: Option<String>,
}
