//! Test: Dockerfile build failures repaired by the agent

use crate::helpers::*;
use containerize::agent::ArtifactKind;
use containerize::tooling::ToolOutcome;

const FIXED: &str = "FROM rust:1.80\nRUN apt-get update && apt-get install -y libssl-dev\n";

#[tokio::test]
async fn test_build_fails_once_then_succeeds() {
    let repo = TestRepo::new(Some("FROM rust:1.80\n"), &[("api-svc", service("api"))]);
    let harness = Harness::new(
        ScriptedBuilder::new(vec![
            ToolOutcome::failure("missing package"),
            ToolOutcome::success("Successfully built"),
        ]),
        ScriptedApplier::new(),
        MockAgent::new(vec![Ok(FIXED.to_string())]),
    );

    let result = run_containerize(&harness, repo.config(3, 3)).await;

    assert_run_succeeded(&result);
    assert_eq!(result.report.dockerfile.unwrap().iteration_count, 1);
    assert!(result.report.kubernetes.is_some());

    // The fix request saw the failing content, the build output and the tree
    let requests = harness.agent.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].kind, ArtifactKind::Dockerfile);
    assert_eq!(requests[0].content, "FROM rust:1.80\n");
    assert_eq!(requests[0].error_text, "missing package");
    assert_eq!(requests[0].repository_tree, REPOSITORY_TREE);

    assert_eq!(harness.builder.builds(), vec!["FROM rust:1.80\n", FIXED]);
    assert_eq!(repo.read("Dockerfile"), FIXED);
    assert!(result.state.dockerfile.build_errors.is_empty());
}

#[tokio::test]
async fn test_missing_dockerfile_is_drafted() {
    let repo = TestRepo::new(None, &[("api-svc", service("api"))]);
    let harness = Harness::new(
        ScriptedBuilder::always_ok(),
        ScriptedApplier::new(),
        MockAgent::new(vec![Ok("FROM node:20\nCOPY . .\n".to_string())]),
    );

    let result = run_containerize(&harness, repo.config(3, 3)).await;

    assert_run_succeeded(&result);
    let requests = harness.agent.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].is_draft());
    assert_eq!(repo.read("Dockerfile"), "FROM node:20\nCOPY . .\n");
}
