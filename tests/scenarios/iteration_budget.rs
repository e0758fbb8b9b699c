//! Test: a loop that never converges runs exactly its budget

use crate::helpers::*;
use containerize::execution::{ExecutionEvent, LoopOutcome};

#[tokio::test]
async fn test_kubernetes_loop_runs_exactly_budget() {
    for budget in 1..=4 {
        let repo = TestRepo::new(Some("FROM rust:1.80\n"), &[("web", broken_service("web"))]);
        let fixes = (1..budget).map(|_| Ok(broken_service("web"))).collect();
        let harness = Harness::new(
            ScriptedBuilder::always_ok(),
            ScriptedApplier::new(),
            MockAgent::new(fixes),
        );

        let result = run_containerize(&harness, repo.config(3, budget)).await;

        let kubernetes = result.report.kubernetes.unwrap();
        assert_eq!(kubernetes.outcome, LoopOutcome::Exhausted, "budget {}", budget);
        assert_eq!(kubernetes.iteration_count, budget - 1, "budget {}", budget);
        assert_eq!(harness.applier.applied().len(), budget, "budget {}", budget);
        assert_eq!(harness.agent.requests().len(), budget - 1, "budget {}", budget);
        assert_eq!(result.state.manifests["web"].attempts as usize, budget);
        assert_nothing_written(&repo, &result);
    }
}

#[tokio::test]
async fn test_dockerfile_loop_runs_exactly_budget() {
    for budget in 1..=4 {
        let repo = TestRepo::new(Some("FROM rust:1.80\n"), &[("web", service("web"))]);
        let harness = Harness::new(
            ScriptedBuilder::always_failing("error: build failed"),
            ScriptedApplier::new(),
            MockAgent::silent(),
        );

        let result = run_containerize(&harness, repo.config(budget, 3)).await;

        assert_eq!(harness.builder.builds().len(), budget, "budget {}", budget);
        assert_eq!(
            result.count_events(|e| matches!(
                e,
                ExecutionEvent::IterationStarted { name, .. } if name == "dockerfile"
            )),
            budget
        );
        assert_eq!(
            result.count_events(|e| matches!(e, ExecutionEvent::LoopFinished { iterations, .. } if *iterations == budget)),
            1
        );
    }
}
