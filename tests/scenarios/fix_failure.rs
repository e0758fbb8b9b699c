//! Test: agent failures leave artifacts unchanged and the loop keeps going

use crate::helpers::*;
use containerize::agent::AgentError;
use containerize::execution::{ExecutionEvent, LoopOutcome};

#[tokio::test]
async fn test_fix_error_keeps_content_and_error_log() {
    let repo = TestRepo::new(Some("FROM rust:1.80\n"), &[("web", broken_service("web"))]);
    let harness = Harness::new(
        ScriptedBuilder::always_ok(),
        ScriptedApplier::new(),
        MockAgent::new(vec![Err(AgentError::Api("rate limited".to_string()))]),
    );

    let result = run_containerize(&harness, repo.config(3, 2)).await;

    // Assert the run was not aborted by the agent error
    assert_run_failed(&result);
    let kubernetes = result.report.kubernetes.unwrap();
    assert_eq!(kubernetes.outcome, LoopOutcome::Exhausted);
    assert_eq!(kubernetes.iteration_count, 1);

    let web = &result.state.manifests["web"];
    assert_eq!(web.content, broken_service("web"));
    assert!(web.error_log.contains("unknown field"));
    assert!(!web.is_deployed);

    // The same content is retried on the next iteration
    let applied = harness.applier.applied();
    assert_eq!(applied.len(), 2);
    assert_eq!(applied[0], applied[1]);

    assert_eq!(
        result.count_events(|e| matches!(e, ExecutionEvent::FixFailed { .. })),
        1
    );
    assert_nothing_written(&repo, &result);
}

#[tokio::test]
async fn test_recovers_after_failed_fix() {
    let repo = TestRepo::new(Some("FROM rust:1.80\n"), &[("web", broken_service("web"))]);
    let harness = Harness::new(
        ScriptedBuilder::always_ok(),
        ScriptedApplier::new(),
        MockAgent::new(vec![
            Err(AgentError::Api("rate limited".to_string())),
            Ok(service("web")),
        ]),
    );

    let result = run_containerize(&harness, repo.config(3, 3)).await;

    assert_run_succeeded(&result);
    assert_eq!(result.report.kubernetes.unwrap().iteration_count, 2);
    assert_eq!(result.state.manifests["web"].attempts, 3);
    assert_eq!(repo.read("manifests/web.yaml"), service("web"));
}

#[tokio::test]
async fn test_unusable_dockerfile_fix_retried_next_iteration() {
    let repo = TestRepo::new(Some("FROM rust:1.80\n"), &[("web", service("web"))]);
    let harness = Harness::new(
        ScriptedBuilder::always_failing("error: failed to compile"),
        ScriptedApplier::new(),
        MockAgent::new(vec![Err(AgentError::Unusable("empty".to_string()))]),
    );

    let result = run_containerize(&harness, repo.config(2, 3)).await;

    assert_run_failed(&result);
    assert_eq!(harness.builder.builds(), vec!["FROM rust:1.80\n", "FROM rust:1.80\n"]);
    assert_eq!(result.state.dockerfile.content, "FROM rust:1.80\n");
    assert!(result.state.dockerfile.build_errors.contains("failed to compile"));
}
