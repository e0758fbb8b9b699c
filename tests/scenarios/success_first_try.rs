//! Test: everything converges on the first iteration

use crate::helpers::*;

#[tokio::test]
async fn test_all_succeed_first_try() {
    let repo = TestRepo::new(
        Some("FROM rust:1.80\n"),
        &[("api", deployment("api")), ("api-svc", service("api"))],
    );
    let harness = Harness::new(
        ScriptedBuilder::always_ok(),
        ScriptedApplier::new(),
        MockAgent::silent(),
    );

    let result = run_containerize(&harness, repo.config(3, 3)).await;

    assert_run_succeeded(&result);
    assert_eq!(result.report.dockerfile.unwrap().iteration_count, 0);
    assert_eq!(result.report.kubernetes.unwrap().iteration_count, 0);
    assert!(harness.agent.requests().is_empty());

    // Both manifests and the Dockerfile are written back
    let commit = result.report.commit.clone().unwrap();
    assert!(commit.is_clean());
    assert_eq!(commit.written.len(), 3);
    assert_eq!(repo.read("Dockerfile"), "FROM rust:1.80\n");
    assert!(repo.read("manifests/api.yaml").contains("image: shop:test"));
    assert_eq!(repo.read("manifests/api-svc.yaml"), service("api"));
}

#[tokio::test]
async fn test_each_manifest_applied_once() {
    let repo = TestRepo::new(
        Some("FROM rust:1.80\n"),
        &[("api", deployment("api")), ("api-svc", service("api"))],
    );
    let harness = Harness::new(
        ScriptedBuilder::always_ok(),
        ScriptedApplier::new(),
        MockAgent::silent(),
    );

    let result = run_containerize(&harness, repo.config(3, 3)).await;

    assert_eq!(harness.applier.applied().len(), 2);
    assert_eq!(harness.builder.builds().len(), 1);
    for status in &result.report.manifests {
        assert!(status.deployed);
        assert_eq!(status.attempts, 1);
        assert!(status.error.is_none());
    }
}
