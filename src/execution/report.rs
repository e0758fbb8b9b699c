//! Run summary returned to callers

use crate::core::state::{ManifestStatus, PipelineState};
use crate::execution::commit::CommitReport;
use crate::execution::executor::LoopOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Final status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Where a loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopSummary {
    pub outcome: LoopOutcome,
    /// Index of the last iteration executed
    pub iteration_count: usize,
}

/// Which stage of an unsuccessful run gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedStage {
    Dockerfile,
    Publish,
    Kubernetes,
}

/// Everything a user needs to know about a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub failed_stage: Option<FailedStage>,
    pub image: Option<String>,
    pub dockerfile: Option<LoopSummary>,
    pub kubernetes: Option<LoopSummary>,
    /// Output of the last failed build
    pub build_errors: Option<String>,
    pub publish_error: Option<String>,
    pub manifests: Vec<ManifestStatus>,
    pub commit: Option<CommitReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub(crate) fn new(state: &PipelineState) -> Self {
        Self {
            run_id: state.run_id,
            status: RunStatus::Failed,
            failed_stage: None,
            image: None,
            dockerfile: None,
            kubernetes: None,
            build_errors: None,
            publish_error: None,
            manifests: Vec::new(),
            commit: None,
            started_at: state.started_at,
            finished_at: state.started_at,
        }
    }

    /// Fill in the per-artifact diagnostics from the final state
    pub(crate) fn finish(mut self, state: &PipelineState, status: RunStatus) -> Self {
        self.status = status;
        self.manifests = state.manifest_statuses();
        if !state.dockerfile.build_errors.is_empty() {
            self.build_errors = Some(state.dockerfile.build_errors.clone());
        }
        self.finished_at = Utc::now();
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    /// Manifests still not deployed
    pub fn failed_manifests(&self) -> impl Iterator<Item = &ManifestStatus> {
        self.manifests.iter().filter(|m| !m.deployed)
    }
}
