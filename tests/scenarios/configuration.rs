//! Test: configuration problems abort before any tool runs

use crate::helpers::*;
use containerize::core::config::RunConfig;
use containerize::PipelineError;

#[tokio::test]
async fn test_empty_manifest_dir_aborts() {
    let repo = TestRepo::new(Some("FROM rust:1.80\n"), &[]);
    let harness = Harness::new(
        ScriptedBuilder::always_ok(),
        ScriptedApplier::new(),
        MockAgent::silent(),
    );

    let result = harness.engine(repo.config(3, 3)).run().await;

    assert!(matches!(result, Err(PipelineError::Config(_))));
    assert!(harness.builder.builds().is_empty());
}

#[tokio::test]
async fn test_config_file_paths_resolve_against_repository() {
    let repo = TestRepo::new(Some("FROM rust:1.80\n"), &[("web", service("web"))]);
    let path = repo.path().join("containerize.yaml");
    std::fs::write(
        &path,
        format!(
            "repository: {}\nimage: shop:test\ndockerfile:\n  max_iterations: 2\n",
            repo.path().display()
        ),
    )
    .unwrap();

    let config = RunConfig::from_file(&path).unwrap();
    assert_eq!(config.dockerfile_path(), repo.path().join("Dockerfile"));
    assert_eq!(config.manifest_dir(), repo.path().join("manifests"));

    let harness = Harness::new(
        ScriptedBuilder::always_ok(),
        ScriptedApplier::new(),
        MockAgent::silent(),
    );
    let result = run_containerize(&harness, config).await;
    assert_run_succeeded(&result);
}
