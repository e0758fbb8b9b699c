//! Test: a Dockerfile that never builds blocks deployment

use crate::helpers::*;
use containerize::execution::{FailedStage, LoopOutcome};

#[tokio::test]
async fn test_build_never_succeeds() {
    let repo = TestRepo::new(
        Some("FROM rust:1.80\n"),
        &[("api", deployment("api")), ("api-svc", service("api"))],
    );
    let harness = Harness::new(
        ScriptedBuilder::always_failing("E: Unable to locate package libfoo"),
        ScriptedApplier::new(),
        MockAgent::new(vec![Ok("FROM rust:1.81\n".to_string())]),
    );

    let result = run_containerize(&harness, repo.config(2, 3)).await;

    assert_run_failed(&result);
    assert_eq!(result.report.failed_stage, Some(FailedStage::Dockerfile));
    let dockerfile = result.report.dockerfile.unwrap();
    assert_eq!(dockerfile.outcome, LoopOutcome::Exhausted);
    assert_eq!(dockerfile.iteration_count, 1);

    // Assert the Kubernetes loop never started
    assert!(result.report.kubernetes.is_none());
    assert!(harness.applier.applied().is_empty());
    assert!(result.report.image.is_none());

    assert!(result.report.build_errors.as_deref().unwrap().contains("libfoo"));
    assert_eq!(harness.builder.builds(), vec!["FROM rust:1.80\n", "FROM rust:1.81\n"]);
    assert_nothing_written(&repo, &result);
}

#[tokio::test]
async fn test_empty_draft_counts_as_failed_build() {
    let repo = TestRepo::new(None, &[("api-svc", service("api"))]);
    let harness = Harness::new(
        ScriptedBuilder::always_ok(),
        ScriptedApplier::new(),
        MockAgent::silent(),
    );

    let result = run_containerize(&harness, repo.config(2, 3)).await;

    assert_run_failed(&result);
    assert_eq!(result.report.failed_stage, Some(FailedStage::Dockerfile));
    // The builder is never handed empty content
    assert!(harness.builder.builds().is_empty());
    assert!(!repo.path().join("Dockerfile").exists());
}
