//! Writing converged artifacts back to the repository

use crate::core::state::PipelineState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// When artifacts are written to disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitPolicy {
    /// Write everything, and only when the whole run succeeded
    #[default]
    SuccessOnly,

    /// Also write the artifacts that converged on an unsuccessful run
    BestEffort,
}

/// Outcome of a commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    /// Paths written
    pub written: Vec<PathBuf>,

    /// Paths whose write failed, with the error text
    pub failures: Vec<(PathBuf, String)>,

    /// Why nothing was written, if so
    pub skipped_reason: Option<String>,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Persist artifacts according to `policy`
///
/// Every write is attempted even when an earlier one fails. A write failure
/// does not change `state.success()`.
pub fn commit(state: &PipelineState, policy: CommitPolicy) -> CommitReport {
    let mut report = CommitReport::default();

    let mut targets: Vec<(&Path, &str)> = Vec::new();
    if state.success() {
        targets.push((state.dockerfile.path.as_path(), state.dockerfile.content.as_str()));
        targets.extend(
            state
                .manifests
                .values()
                .map(|m| (m.path.as_path(), m.content.as_str())),
        );
    } else if policy == CommitPolicy::BestEffort {
        if state.dockerfile.build_succeeded {
            targets.push((state.dockerfile.path.as_path(), state.dockerfile.content.as_str()));
        }
        targets.extend(
            state
                .manifests
                .values()
                .filter(|m| m.is_deployed)
                .map(|m| (m.path.as_path(), m.content.as_str())),
        );
        if targets.is_empty() {
            report.skipped_reason = Some("no artifact converged".to_string());
        }
    } else {
        info!("Run {} was not successful; writing nothing", state.run_id);
        report.skipped_reason = Some("run was not successful".to_string());
        return report;
    }

    for (path, content) in targets {
        match write_artifact(path, content) {
            Ok(()) => {
                info!("Wrote {}", path.display());
                report.written.push(path.to_path_buf());
            }
            Err(e) => {
                error!("Failed to write {}: {}", path.display(), e);
                report.failures.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    if !report.failures.is_empty() {
        warn!(
            "{} of {} artifact writes failed",
            report.failures.len(),
            report.failures.len() + report.written.len()
        );
    }

    report
}

fn write_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)
}
