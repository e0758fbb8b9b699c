//! Test utility functions for containerize
#![allow(dead_code)]

use containerize::agent::{AgentError, FixAgent, FixRequest};
use containerize::core::config::RunConfig;
use containerize::core::state::{PipelineState, ResourceRef};
use containerize::execution::{ContainerizeEngine, ExecutionEvent, RunReport, RunStatus};
use containerize::tooling::{ImageBuilder, ManifestApplier, RepositoryScanner, ToolError, ToolOutcome};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const REPOSITORY_TREE: &str = "Cargo.toml\nsrc/\n  main.rs";

/// Image builder that returns predefined outcomes in order
///
/// The last outcome repeats once the script runs out.
pub struct ScriptedBuilder {
    outcomes: Vec<ToolOutcome>,
    index: AtomicUsize,
    builds: Mutex<Vec<String>>,
    publish_outcome: ToolOutcome,
}

impl ScriptedBuilder {
    pub fn new(outcomes: Vec<ToolOutcome>) -> Self {
        Self {
            outcomes,
            index: AtomicUsize::new(0),
            builds: Mutex::new(Vec::new()),
            publish_outcome: ToolOutcome::success("pushed"),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(vec![ToolOutcome::success("Successfully built")])
    }

    pub fn always_failing(output: &str) -> Self {
        Self::new(vec![ToolOutcome::failure(output)])
    }

    /// Dockerfile contents passed to each build, in order
    pub fn builds(&self) -> Vec<String> {
        self.builds.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBuilder for ScriptedBuilder {
    async fn build(
        &self,
        dockerfile: &str,
        _context: &Path,
        _image: &str,
    ) -> Result<ToolOutcome, ToolError> {
        self.builds.lock().unwrap().push(dockerfile.to_string());
        let idx = self.index.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .get(idx)
            .or_else(|| self.outcomes.last())
            .cloned()
            .unwrap_or_else(|| ToolOutcome::failure("ScriptedBuilder: empty script"));
        Ok(outcome)
    }

    async fn publish(&self, _image: &str, _target: &str) -> Result<ToolOutcome, ToolError> {
        Ok(self.publish_outcome.clone())
    }
}

/// Image builder whose calls never finish in test time
#[derive(Default)]
pub struct HangingBuilder {
    started: AtomicUsize,
}

impl HangingBuilder {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageBuilder for HangingBuilder {
    async fn build(&self, _: &str, _: &Path, _: &str) -> Result<ToolOutcome, ToolError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(ToolOutcome::success(""))
    }

    async fn publish(&self, _: &str, _: &str) -> Result<ToolOutcome, ToolError> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(ToolOutcome::success(""))
    }
}

/// Applier that fails any manifest containing `broken` and any workload
/// whose name is listed as never ready
pub struct ScriptedApplier {
    applied: Mutex<Vec<String>>,
    never_ready: Vec<String>,
}

impl ScriptedApplier {
    pub fn new() -> Self {
        Self {
            applied: Mutex::new(Vec::new()),
            never_ready: Vec::new(),
        }
    }

    pub fn with_never_ready(mut self, name: &str) -> Self {
        self.never_ready.push(name.to_string());
        self
    }

    /// Manifest contents passed to apply, in order
    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }

    /// How many applies carried a manifest containing `marker`
    pub fn apply_count(&self, marker: &str) -> usize {
        self.applied().iter().filter(|m| m.contains(marker)).count()
    }
}

#[async_trait]
impl ManifestApplier for ScriptedApplier {
    async fn apply(&self, manifest: &str) -> Result<ToolOutcome, ToolError> {
        self.applied.lock().unwrap().push(manifest.to_string());
        if manifest.contains("broken") {
            Ok(ToolOutcome::failure(
                "error: error validating data: unknown field \"broken\"",
            ))
        } else {
            Ok(ToolOutcome::success("configured"))
        }
    }

    async fn check_ready(&self, resource: &ResourceRef) -> Result<ToolOutcome, ToolError> {
        if self.never_ready.contains(&resource.name) {
            Ok(ToolOutcome::failure(format!(
                "error: deployment \"{}\" exceeded its progress deadline",
                resource.name
            )))
        } else {
            Ok(ToolOutcome::success("successfully rolled out"))
        }
    }
}

/// Mock agent that returns predefined responses
pub struct MockAgent {
    responses: Mutex<Vec<Result<String, AgentError>>>,
    requests: Mutex<Vec<FixRequest>>,
}

impl MockAgent {
    pub fn new(responses: Vec<Result<String, AgentError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    pub fn requests(&self) -> Vec<FixRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FixAgent for MockAgent {
    async fn request_fix(&self, request: &FixRequest) -> Result<String, AgentError> {
        let idx = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(AgentError::Internal(format!(
                "MockAgent: No response available for request {}",
                idx
            )));
        }
        responses.remove(0)
    }
}

/// Scanner returning a fixed tree
pub struct StaticScanner;

#[async_trait]
impl RepositoryScanner for StaticScanner {
    async fn scan(&self, _root: &Path) -> Result<String, ToolError> {
        Ok(REPOSITORY_TREE.to_string())
    }
}

/// Capabilities handed to the engine
pub struct Harness {
    pub builder: Arc<ScriptedBuilder>,
    pub applier: Arc<ScriptedApplier>,
    pub agent: Arc<MockAgent>,
}

impl Harness {
    pub fn new(builder: ScriptedBuilder, applier: ScriptedApplier, agent: MockAgent) -> Self {
        Self {
            builder: Arc::new(builder),
            applier: Arc::new(applier),
            agent: Arc::new(agent),
        }
    }

    pub fn engine(&self, config: RunConfig) -> ContainerizeEngine {
        ContainerizeEngine::new(
            config,
            self.builder.clone(),
            self.applier.clone(),
            self.agent.clone(),
            Arc::new(StaticScanner),
        )
    }
}

/// A repository on disk with a Dockerfile and manifests
pub struct TestRepo {
    pub dir: TempDir,
    originals: BTreeMap<PathBuf, String>,
}

impl TestRepo {
    pub fn new(dockerfile: Option<&str>, manifests: &[(&str, String)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut originals = BTreeMap::new();

        if let Some(content) = dockerfile {
            let path = dir.path().join("Dockerfile");
            std::fs::write(&path, content).unwrap();
            originals.insert(path, content.to_string());
        }

        std::fs::create_dir(dir.path().join("manifests")).unwrap();
        for (name, content) in manifests {
            let path = dir.path().join("manifests").join(format!("{}.yaml", name));
            std::fs::write(&path, content).unwrap();
            originals.insert(path, content.clone());
        }

        Self { dir, originals }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path().join(relative)).unwrap()
    }

    /// Configuration pointing at this repository
    pub fn config(&self, max_build: usize, max_deploy: usize) -> RunConfig {
        let mut config = RunConfig {
            repository: self.path().to_path_buf(),
            image: Some("shop:test".to_string()),
            ..Default::default()
        };
        config.dockerfile.max_iterations = max_build;
        config.kubernetes.max_iterations = max_deploy;
        config
    }

    /// Whether every file still holds its original content and nothing was added
    pub fn is_untouched(&self) -> bool {
        let unchanged = self
            .originals
            .iter()
            .all(|(path, content)| std::fs::read_to_string(path).ok().as_deref() == Some(content));
        let dockerfile = self.path().join("Dockerfile");
        unchanged && (self.originals.contains_key(&dockerfile) || !dockerfile.exists())
    }
}

pub fn deployment(name: &str) -> String {
    format!(
        "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: {name}\nspec:\n  template:\n    spec:\n      containers:\n        - name: {name}\n          image: placeholder:latest\n"
    )
}

pub fn service(name: &str) -> String {
    format!("apiVersion: v1\nkind: Service\nmetadata:\n  name: {name}\nspec:\n  ports:\n    - port: 80\n")
}

pub fn broken_service(name: &str) -> String {
    format!("{}broken: true\n", service(name))
}

/// Test result from running the engine
pub struct RunTestResult {
    pub report: RunReport,
    pub state: PipelineState,
    pub events: Vec<ExecutionEvent>,
}

impl RunTestResult {
    pub fn manifest_deployed(&self, name: &str) -> bool {
        self.state.manifests[name].is_deployed
    }

    pub fn count_events<F: Fn(&ExecutionEvent) -> bool>(&self, predicate: F) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

/// Prepare and execute a run, collecting every event
pub async fn run_containerize(
    harness: &Harness,
    config: RunConfig,
) -> RunTestResult {
    run_engine(harness.engine(config)).await
}

pub async fn run_engine(mut engine: ContainerizeEngine) -> RunTestResult {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let mut state = engine.prepare().await.expect("prepare failed");
    let report = engine.execute(&mut state).await.expect("run aborted");
    let events = events.lock().unwrap().clone();

    RunTestResult {
        report,
        state,
        events,
    }
}

/// Assert that the run succeeded
pub fn assert_run_succeeded(result: &RunTestResult) {
    assert_eq!(
        result.report.status,
        RunStatus::Succeeded,
        "Expected success, got {:?} (failed stage {:?})",
        result.report.status,
        result.report.failed_stage
    );
    assert!(result.state.success());
}

/// Assert that the run failed without being cancelled
pub fn assert_run_failed(result: &RunTestResult) {
    assert_eq!(result.report.status, RunStatus::Failed);
    assert!(!result.state.success());
}

/// Assert that the repository was not modified
pub fn assert_nothing_written(repo: &TestRepo, result: &RunTestResult) {
    assert!(repo.is_untouched(), "Repository was modified");
    if let Some(commit) = &result.report.commit {
        assert!(commit.written.is_empty(), "Wrote {:?}", commit.written);
    }
}
