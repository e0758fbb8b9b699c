//! CLI output formatting

use crate::execution::{CommitReport, ExecutionEvent, FailedStage, LoopOutcome, RunReport, RunStatus};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static WRENCH: Emoji<'_, '_> = Emoji("🔧 ", "* ");

/// Create a spinner shown while a build or apply is in flight
pub fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Short run ID for display
fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted { run_id, repository } => format!(
            "{} Containerizing {} ({})",
            ROCKET,
            style(repository).bold(),
            style(short_id(run_id)).dim()
        ),
        ExecutionEvent::LoopStarted {
            name,
            max_iterations,
        } => format!(
            "{} {} loop (up to {} iterations)",
            INFO,
            style(name).bold(),
            max_iterations
        ),
        ExecutionEvent::IterationStarted { name, iteration } => format!(
            "{} {} iteration {}",
            SPINNER,
            style(name).cyan(),
            iteration + 1
        ),
        ExecutionEvent::BuildFailed { iteration, output } => format!(
            "{} Build failed (iteration {}):\n{}",
            CROSS,
            iteration + 1,
            style(format_output(output, 8)).dim()
        ),
        ExecutionEvent::BuildSucceeded { iteration } => format!(
            "{} Image built (iteration {})",
            CHECK,
            iteration + 1
        ),
        ExecutionEvent::ManifestApplied { name, .. } => {
            format!("{} {} deployed", CHECK, style(name).green())
        }
        ExecutionEvent::ManifestFailed { name, error, .. } => format!(
            "{} {}: {}",
            CROSS,
            style(name).red(),
            style(format_output(error, 4)).dim()
        ),
        ExecutionEvent::FixApplied { artifact } => {
            format!("{} Applied agent fix to {}", WRENCH, style(artifact).cyan())
        }
        ExecutionEvent::FixFailed { artifact, error } => format!(
            "{} No fix for {}: {}",
            WARN,
            style(artifact).yellow(),
            style(error).dim()
        ),
        ExecutionEvent::LoopFinished {
            name,
            outcome,
            iterations,
        } => match outcome {
            LoopOutcome::Converged => format!(
                "{} {} loop converged after {} iteration(s)",
                CHECK,
                style(name).bold(),
                iterations
            ),
            LoopOutcome::Exhausted => format!(
                "{} {} loop gave up after {} iteration(s)",
                CROSS,
                style(name).bold(),
                iterations
            ),
        },
        ExecutionEvent::Committed { report } => format_commit(report),
        ExecutionEvent::RunFinished { run_id, success } => {
            let status = if *success {
                style("succeeded").green().to_string()
            } else {
                style("failed").red().to_string()
            };
            format!("{} Run ({}) {}", INFO, style(short_id(run_id)).dim(), status)
        }
    }
}

fn format_commit(report: &CommitReport) -> String {
    if let Some(reason) = &report.skipped_reason {
        if report.written.is_empty() && report.failures.is_empty() {
            return format!("{} Nothing written: {}", INFO, reason);
        }
    }

    let mut lines = Vec::new();
    for path in &report.written {
        lines.push(format!("{} Wrote {}", CHECK, style(path.display()).bold()));
    }
    for (path, error) in &report.failures {
        lines.push(format!(
            "{} Could not write {}: {}",
            CROSS,
            style(path.display()).bold(),
            style(error).red()
        ));
    }
    lines.join("\n")
}

/// Format the final report for display
pub fn format_report(report: &RunReport) -> String {
    let mut lines = Vec::new();

    match report.status {
        RunStatus::Succeeded => {
            lines.push(format!("{} Run {}", CHECK, style("succeeded").green()));
            if let Some(image) = &report.image {
                lines.push(format!("  Image: {}", style(image).cyan()));
            }
        }
        RunStatus::Cancelled => {
            lines.push(format!(
                "{} Run {}; nothing was written",
                WARN,
                style("cancelled").yellow()
            ));
        }
        RunStatus::Failed => {
            let stage = match report.failed_stage {
                Some(FailedStage::Dockerfile) => "Dockerfile loop did not converge",
                Some(FailedStage::Publish) => "image could not be published",
                Some(FailedStage::Kubernetes) => "Kubernetes loop did not converge",
                None => "run did not converge",
            };
            lines.push(format!("{} Run {}: {}", CROSS, style("failed").red(), stage));

            if report.failed_stage == Some(FailedStage::Dockerfile) {
                if let Some(errors) = &report.build_errors {
                    lines.push(format!("  Last build output:\n{}", indent(&format_output(errors, 20))));
                }
            }
            if let Some(error) = &report.publish_error {
                lines.push(format!("  Publish output:\n{}", indent(&format_output(error, 10))));
            }
        }
    }

    if !report.manifests.is_empty() && report.kubernetes.is_some() {
        lines.push("  Manifests:".to_string());
        for manifest in &report.manifests {
            if manifest.deployed {
                lines.push(format!(
                    "    {} {} ({} attempt(s))",
                    CHECK,
                    style(&manifest.name).green(),
                    manifest.attempts
                ));
            } else {
                lines.push(format!(
                    "    {} {} ({} attempt(s))",
                    CROSS,
                    style(&manifest.name).red(),
                    manifest.attempts
                ));
                if let Some(error) = &manifest.error {
                    lines.push(indent(&indent(&indent(&format_output(error, 6)))));
                }
            }
        }
    }

    lines.join("\n")
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format tool output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.trim_end().lines().collect();

    if lines.len() <= max_lines {
        lines.join("\n")
    } else {
        // Errors are usually at the end of build output
        let kept = lines[lines.len() - max_lines..].join("\n");
        format!(
            "{}... ({} earlier lines)\n{}",
            style("[truncated]").dim(),
            lines.len() - max_lines,
            kept
        )
    }
}
