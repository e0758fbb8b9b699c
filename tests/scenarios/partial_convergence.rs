//! Test: one manifest never converges while the others deploy

use crate::helpers::*;
use containerize::agent::ArtifactKind;
use containerize::execution::{FailedStage, LoopOutcome};

const DOCKERFILE: &str = "FROM rust:1.80\n";

fn repo() -> TestRepo {
    TestRepo::new(
        Some(DOCKERFILE),
        &[
            ("api", deployment("api")),
            ("cache", service("cache")),
            ("web", service("web")),
        ],
    )
}

#[tokio::test]
async fn test_one_manifest_never_ready() {
    let repo = repo();
    let harness = Harness::new(
        ScriptedBuilder::always_ok(),
        ScriptedApplier::new().with_never_ready("api"),
        MockAgent::new(vec![Ok(deployment("api")), Ok(deployment("api"))]),
    );

    let result = run_containerize(&harness, repo.config(3, 3)).await;

    assert_run_failed(&result);
    assert_eq!(result.report.failed_stage, Some(FailedStage::Kubernetes));
    let kubernetes = result.report.kubernetes.unwrap();
    assert_eq!(kubernetes.outcome, LoopOutcome::Exhausted);
    assert_eq!(kubernetes.iteration_count, 2);

    // Assert the healthy manifests deployed and the failing one did not
    assert!(result.manifest_deployed("cache"));
    assert!(result.manifest_deployed("web"));
    assert!(!result.manifest_deployed("api"));
    let api = &result.state.manifests["api"];
    assert_eq!(api.attempts, 3);
    assert!(api.error_log.contains("progress deadline"));

    // Deployed manifests are never submitted again
    assert_eq!(harness.applier.apply_count("name: cache"), 1);
    assert_eq!(harness.applier.apply_count("name: web"), 1);
    assert_eq!(harness.applier.apply_count("name: api"), 3);

    // No fix is requested on the last iteration
    let requests = harness.agent.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.kind, ArtifactKind::Manifest);
        assert_eq!(request.related.as_deref(), Some(DOCKERFILE));
        assert!(request.error_text.contains("progress deadline"));
    }

    assert_nothing_written(&repo, &result);
}

#[tokio::test]
async fn test_failed_manifests_listed_in_report() {
    let repo = repo();
    let harness = Harness::new(
        ScriptedBuilder::always_ok(),
        ScriptedApplier::new().with_never_ready("api"),
        MockAgent::silent(),
    );

    let result = run_containerize(&harness, repo.config(3, 2)).await;

    let failed: Vec<_> = result.report.failed_manifests().map(|m| m.name.clone()).collect();
    assert_eq!(failed, vec!["api".to_string()]);
    assert_eq!(result.report.manifests.len(), 3);
    assert_eq!(
        result.count_events(|e| matches!(e, containerize::execution::ExecutionEvent::FixFailed { .. })),
        1
    );
}
