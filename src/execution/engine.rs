//! Main execution engine - orchestrates a whole containerization run

use crate::agent::{AgentClientConfig, FixAgent, SubprocessAgent};
use crate::core::{
    config::RunConfig,
    error::PipelineError,
    manifest::discover_manifests,
    state::{all_manifests_deployed, DockerfileArtifact, PipelineState, IMAGE_KEY, REGISTRY_KEY},
    step::StepList,
};
use crate::execution::{
    commit::commit,
    dockerfile::{self, BuildStep, DraftDockerfileStep, FixDockerfileStep},
    events::{EventBus, EventHandler, ExecutionEvent},
    executor::{LoopExecutor, LoopOutcome},
    fixer::Fixer,
    interrupt::Interrupt,
    kubernetes::{self, ApplyStep, FixManifestsStep, PinImageStep},
    report::{FailedStage, LoopSummary, RunReport, RunStatus},
};
use crate::tooling::{
    DockerCli, FileTreeScanner, ImageBuilder, KubectlCli, ManifestApplier, RepositoryScanner,
};
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Slack over the publish budget so the builder reports its own timeout first
const PUBLISH_GRACE: Duration = Duration::from_secs(5);

/// Drives the Dockerfile loop, the Kubernetes loop and the final commit
pub struct ContainerizeEngine {
    config: RunConfig,
    builder: Arc<dyn ImageBuilder>,
    applier: Arc<dyn ManifestApplier>,
    agent: Arc<dyn FixAgent>,
    scanner: Arc<dyn RepositoryScanner>,
    event_handlers: Vec<EventHandler>,
    interrupt: Interrupt,
}

impl ContainerizeEngine {
    pub fn new(
        config: RunConfig,
        builder: Arc<dyn ImageBuilder>,
        applier: Arc<dyn ManifestApplier>,
        agent: Arc<dyn FixAgent>,
        scanner: Arc<dyn RepositoryScanner>,
    ) -> Self {
        Self {
            config,
            builder,
            applier,
            agent,
            scanner,
            event_handlers: Vec::new(),
            interrupt: Interrupt::new(),
        }
    }

    /// Engine backed by docker, kubectl and the configured agent CLI
    pub fn from_config(config: RunConfig) -> Self {
        let timeouts = &config.timeouts;
        let builder = DockerCli::new(timeouts.build()).with_publish_timeout(timeouts.publish());
        let applier = KubectlCli::new(timeouts.apply(), timeouts.ready())
            .with_namespace(config.kubernetes.namespace.clone());
        let agent = SubprocessAgent::new(AgentClientConfig::from_config(
            &config.agent,
            timeouts.fix_secs,
        ));

        Self::new(
            config,
            Arc::new(builder),
            Arc::new(applier),
            Arc::new(agent),
            Arc::new(FileTreeScanner::default()),
        )
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Handle that cancels the run, abandoning whatever call is in flight
    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    fn check_interrupted(&self) -> Result<(), PipelineError> {
        if self.interrupt.is_triggered() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Scan the repository and build the initial state
    ///
    /// A missing Dockerfile starts the run with empty content, which the
    /// Dockerfile loop drafts. Missing or empty manifest directories abort.
    pub async fn prepare(&self) -> Result<PipelineState, PipelineError> {
        let repository = &self.config.repository;
        info!("Preparing run for {}", repository.display());

        let tree = self.scanner.scan(repository).await.map_err(|e| {
            PipelineError::config(format!("Cannot read repository {}: {}", repository.display(), e))
        })?;

        let dockerfile_path = self.config.dockerfile_path();
        let content = match tokio::fs::read_to_string(&dockerfile_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No Dockerfile at {}", dockerfile_path.display());
                String::new()
            }
            Err(e) => return Err(PipelineError::io(&dockerfile_path, e)),
        };

        let manifests = discover_manifests(&self.config.manifest_dir())?;

        let mut state = PipelineState::new(tree, DockerfileArtifact::new(content, dockerfile_path));
        state.manifests = manifests;
        state.set_metadata(IMAGE_KEY, self.config.image_ref());
        if let Some(registry) = &self.config.registry {
            state.set_metadata(REGISTRY_KEY, registry.clone());
        }
        Ok(state)
    }

    /// Prepare and execute a run
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let mut state = self.prepare().await?;
        self.execute(&mut state).await
    }

    /// Execute both loops against `state`, then commit
    ///
    /// Cancellation yields a report with `RunStatus::Cancelled` and writes
    /// nothing. Only configuration and I/O errors are returned as `Err`.
    pub async fn execute(&self, state: &mut PipelineState) -> Result<RunReport, PipelineError> {
        let events = EventBus::new(self.event_handlers.clone());
        let mut report = RunReport::new(state);

        info!("Starting run {}", state.run_id);
        events.emit(ExecutionEvent::RunStarted {
            run_id: state.run_id,
            repository: self.config.repository.display().to_string(),
        });

        match self.drive(state, &events, &mut report).await {
            Ok(success) => {
                state.set_success(success);
                let committed = commit(state, self.config.commit.policy);
                events.emit(ExecutionEvent::Committed {
                    report: committed.clone(),
                });
                report.commit = Some(committed);

                let status = if success {
                    RunStatus::Succeeded
                } else {
                    RunStatus::Failed
                };
                info!("Run {} finished: {:?}", state.run_id, status);
                events.emit(ExecutionEvent::RunFinished {
                    run_id: state.run_id,
                    success,
                });
                Ok(report.finish(state, status))
            }
            Err(PipelineError::Cancelled) => {
                warn!("Run {} cancelled; nothing written", state.run_id);
                state.set_success(false);
                events.emit(ExecutionEvent::RunFinished {
                    run_id: state.run_id,
                    success: false,
                });
                Ok(report.finish(state, RunStatus::Cancelled))
            }
            Err(e) => {
                error!("Run {} aborted: {}", state.run_id, e);
                Err(e)
            }
        }
    }

    /// Run the loops; returns whether everything converged
    async fn drive(
        &self,
        state: &mut PipelineState,
        events: &EventBus,
        report: &mut RunReport,
    ) -> Result<bool, PipelineError> {
        let config = &self.config;
        let fixer = Fixer::new(
            self.agent.clone(),
            config.timeouts.fix(),
            config.agent.fix_retries,
        )
        .with_events(events.clone());

        let image = config.image_name();
        let dockerfile_steps: StepList = vec![
            Box::new(DraftDockerfileStep::new(fixer.clone())),
            Box::new(
                BuildStep::new(
                    self.builder.clone(),
                    config.repository.clone(),
                    image.clone(),
                    config.timeouts.build(),
                )
                .with_events(events.clone()),
            ),
            Box::new(FixDockerfileStep::new(fixer.clone())),
        ];

        let outcome = LoopExecutor::new(dockerfile::LOOP_NAME, config.dockerfile.max_iterations)
            .with_interrupt(self.interrupt.clone())
            .with_events(events.clone())
            .run(&dockerfile_steps, dockerfile::should_continue, state)
            .await?;
        report.dockerfile = Some(LoopSummary {
            outcome,
            iteration_count: state.iteration_count,
        });

        if !outcome.is_converged() {
            warn!("Dockerfile did not build; skipping deployment");
            report.failed_stage = Some(FailedStage::Dockerfile);
            return Ok(false);
        }

        self.check_interrupted()?;
        let image_ref = config.image_ref();
        if config.registry.is_some() {
            let published = tokio::select! {
                result = self.publish(&image, &image_ref) => result,
                _ = self.interrupt.triggered() => return Err(PipelineError::Cancelled),
            };
            if let Err(message) = published {
                error!("Publishing {} failed: {}", image_ref, message);
                report.failed_stage = Some(FailedStage::Publish);
                report.publish_error = Some(message);
                return Ok(false);
            }
        }
        report.image = Some(image_ref.clone());
        state.set_metadata(IMAGE_KEY, image_ref);

        let kubernetes_steps: StepList = vec![
            Box::new(PinImageStep),
            Box::new(
                ApplyStep::new(
                    self.applier.clone(),
                    config.kubernetes.scheduling(),
                    config.timeouts.apply(),
                    config.timeouts.ready(),
                )
                .with_events(events.clone()),
            ),
            Box::new(FixManifestsStep::new(fixer)),
        ];

        let outcome = LoopExecutor::new(kubernetes::LOOP_NAME, config.kubernetes.max_iterations)
            .with_interrupt(self.interrupt.clone())
            .with_events(events.clone())
            .run(&kubernetes_steps, kubernetes::should_continue, state)
            .await?;
        report.kubernetes = Some(LoopSummary {
            outcome,
            iteration_count: state.iteration_count,
        });

        self.check_interrupted()?;
        let success = outcome == LoopOutcome::Converged
            && state.dockerfile.build_succeeded
            && all_manifests_deployed(&state.manifests);
        if !success {
            report.failed_stage = Some(FailedStage::Kubernetes);
        }
        Ok(success)
    }

    async fn publish(&self, image: &str, target: &str) -> Result<(), String> {
        info!("Publishing {} as {}", image, target);
        let budget = self.config.timeouts.publish();
        match timeout(budget + PUBLISH_GRACE, self.builder.publish(image, target)).await {
            Ok(Ok(outcome)) if outcome.succeeded => Ok(()),
            Ok(Ok(outcome)) => Err(outcome.output),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("Publish timed out after {} seconds", budget.as_secs())),
        }
    }
}
