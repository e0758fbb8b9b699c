//! Kubernetes deploy-fix loop

use crate::agent::{ArtifactKind, FixRequest};
use crate::core::{
    error::PipelineError,
    manifest::parse_manifest,
    state::{all_manifests_deployed, PipelineState, ResourceRef, IMAGE_KEY},
    step::Step,
};
use crate::execution::events::{EventBus, ExecutionEvent};
use crate::execution::fixer::Fixer;
use crate::execution::scheduler::SchedulingStrategy;
use crate::tooling::ManifestApplier;
use async_trait::async_trait;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Name of the Kubernetes loop in logs and events
pub const LOOP_NAME: &str = "kubernetes";

/// Slack on top of the readiness timeout so the applier can report its own timeout
const READY_GRACE: Duration = Duration::from_secs(15);

/// Continue while any manifest is not deployed
pub fn should_continue(state: &PipelineState) -> bool {
    !all_manifests_deployed(&state.manifests)
}

/// Points workload manifests at the image the Dockerfile loop built
///
/// Only `spec.template.spec.containers[0]` is rewritten; init containers and
/// sidecars keep their images. Runs on the first iteration only; later
/// iterations leave the image to the agent's fixes.
pub struct PinImageStep;

/// Patterns for the in-place rewrite that keeps the manifest's formatting
struct ImagePatterns {
    containers_key: Regex,
    image_line: Regex,
}

impl ImagePatterns {
    fn new() -> Result<Self, PipelineError> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| PipelineError::config(format!("Invalid image pattern: {}", e)))
        };
        Ok(Self {
            containers_key: compile(r"(?m)^[ \t]*containers:[ \t]*$")?,
            image_line: compile(r#"(?m)^([ \t]*(?:-[ \t]+)?image:[ \t]*)["']?[^\s"'#]+["']?"#)?,
        })
    }

    /// Replace the first `image:` line below the block-style `containers:` key
    fn rewrite(&self, content: &str, image: &str) -> Option<String> {
        let key = self.containers_key.find(content)?;
        let (head, tail) = content.split_at(key.end());
        let tail = self
            .image_line
            .replace(tail, |caps: &Captures| format!("{}{}", &caps[1], image));
        Some(format!("{}{}", head, tail))
    }
}

/// Image of the first container in the first document's pod template
fn first_container_image(content: &str) -> Option<String> {
    let document = serde_yaml::Deserializer::from_str(content).next()?;
    let value = Value::deserialize(document).ok()?;
    value
        .get("spec")?
        .get("template")?
        .get("spec")?
        .get("containers")?
        .get(0)?
        .get("image")?
        .as_str()
        .map(str::to_string)
}

/// Set the first container's image through the parsed document
///
/// Comments and formatting are lost, so this is only used when the in-place
/// rewrite cannot be confirmed. Multi-document manifests are left alone.
fn set_first_container_image(content: &str, image: &str) -> Option<String> {
    let mut value: Value = serde_yaml::from_str(content).ok()?;
    let container = value
        .get_mut("spec")?
        .get_mut("template")?
        .get_mut("spec")?
        .get_mut("containers")?
        .get_mut(0)?
        .as_mapping_mut()?;
    container.insert(Value::from("image"), Value::from(image));
    serde_yaml::to_string(&value).ok()
}

fn pin_image(content: &str, image: &str, patterns: &ImagePatterns) -> Option<String> {
    if let Some(rewritten) = patterns.rewrite(content, image) {
        // Unparseable manifests cannot be checked; the agent gets to fix them anyway
        if !parses(content) || first_container_image(&rewritten).as_deref() == Some(image) {
            return Some(rewritten);
        }
    }
    set_first_container_image(content, image)
}

fn parses(content: &str) -> bool {
    serde_yaml::Deserializer::from_str(content)
        .next()
        .map(|document| Value::deserialize(document).is_ok())
        .unwrap_or(false)
}

#[async_trait]
impl Step for PinImageStep {
    fn name(&self) -> &str {
        "pin-image"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        if state.iteration_count > 0 {
            return Ok(());
        }
        let Some(image) = state.metadata(IMAGE_KEY).map(str::to_string) else {
            return Ok(());
        };

        let patterns = ImagePatterns::new()?;

        for manifest in state.manifests.values_mut() {
            if !manifest.is_deployment_type || manifest.is_deployed {
                continue;
            }
            match pin_image(&manifest.content, &image, &patterns) {
                Some(pinned) if pinned != manifest.content => {
                    debug!("Pinned image {} in manifest {}", image, manifest.name);
                    manifest.content = pinned;
                }
                Some(_) => {}
                None => debug!("No container image to pin in manifest {}", manifest.name),
            }
        }
        Ok(())
    }
}

/// Read-only copy of what one apply attempt needs
struct ApplyJob {
    name: String,
    content: String,
    resource: Option<ResourceRef>,
    is_deployment_type: bool,
}

/// Applies every pending manifest, then records all outcomes in one pass
pub struct ApplyStep {
    applier: Arc<dyn ManifestApplier>,
    strategy: SchedulingStrategy,
    apply_timeout: Duration,
    ready_timeout: Duration,
    events: EventBus,
}

impl ApplyStep {
    pub fn new(
        applier: Arc<dyn ManifestApplier>,
        strategy: SchedulingStrategy,
        apply_timeout: Duration,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            applier,
            strategy,
            apply_timeout,
            ready_timeout,
            events: EventBus::default(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    async fn attempt(
        applier: Arc<dyn ManifestApplier>,
        job: &ApplyJob,
        apply_timeout: Duration,
        ready_timeout: Duration,
    ) -> Result<(), String> {
        let applied = match timeout(apply_timeout, applier.apply(&job.content)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => {
                return Err(format!(
                    "Apply timed out after {} seconds",
                    apply_timeout.as_secs()
                ))
            }
        };
        if !applied.succeeded {
            return Err(non_empty(applied.output, "Apply failed without output"));
        }

        if !job.is_deployment_type {
            return Ok(());
        }

        let resource = job.resource.as_ref().ok_or_else(|| {
            "Cannot check readiness: manifest has no metadata.name".to_string()
        })?;

        match timeout(ready_timeout + READY_GRACE, applier.check_ready(resource)).await {
            Ok(Ok(outcome)) if outcome.succeeded => Ok(()),
            Ok(Ok(outcome)) => Err(format!(
                "Applied but {} is not ready:\n{}",
                resource.qualified_name(),
                outcome.output.trim_end()
            )),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "{} not ready after {} seconds",
                resource.qualified_name(),
                ready_timeout.as_secs()
            )),
        }
    }

    async fn attempt_all(&self, jobs: Vec<ApplyJob>) -> BTreeMap<String, Result<(), String>> {
        let concurrency = self.strategy.concurrency(jobs.len());
        let mut results = BTreeMap::new();

        if concurrency == 1 {
            for job in &jobs {
                let result = Self::attempt(
                    self.applier.clone(),
                    job,
                    self.apply_timeout,
                    self.ready_timeout,
                )
                .await;
                results.insert(job.name.clone(), result);
            }
            return results;
        }

        debug!("Applying {} manifests, {} at a time", jobs.len(), concurrency);
        let names: Vec<String> = jobs.iter().map(|j| j.name.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();

        for job in jobs {
            let applier = self.applier.clone();
            let semaphore = semaphore.clone();
            let (apply_timeout, ready_timeout) = (self.apply_timeout, self.ready_timeout);
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => Self::attempt(applier, &job, apply_timeout, ready_timeout).await,
                    Err(e) => Err(format!("Apply scheduling failed: {}", e)),
                };
                (job.name, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, result)) => {
                    results.insert(name, result);
                }
                Err(e) => warn!("Apply task aborted: {}", e),
            }
        }

        for name in names {
            results
                .entry(name)
                .or_insert_with(|| Err("Apply task aborted".to_string()));
        }
        results
    }
}

#[async_trait]
impl Step for ApplyStep {
    fn name(&self) -> &str {
        "apply"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        let jobs: Vec<ApplyJob> = state
            .pending_manifests()
            .map(|m| ApplyJob {
                name: m.name.clone(),
                content: m.content.clone(),
                resource: m.resource.clone(),
                is_deployment_type: m.is_deployment_type,
            })
            .collect();

        if jobs.is_empty() {
            return Ok(());
        }

        let iteration = state.iteration_count;
        info!("Applying {} pending manifests", jobs.len());
        let results = self.attempt_all(jobs).await;

        for (name, result) in results {
            let Some(manifest) = state.manifests.get_mut(&name) else {
                continue;
            };
            manifest.attempts += 1;
            match result {
                Ok(()) => {
                    info!("Manifest {} deployed", name);
                    manifest.is_deployed = true;
                    manifest.error_log.clear();
                    self.events
                        .emit(ExecutionEvent::ManifestApplied { name, iteration });
                }
                Err(error) => {
                    warn!("Manifest {} failed on iteration {}", name, iteration);
                    manifest.error_log = error.clone();
                    self.events.emit(ExecutionEvent::ManifestFailed {
                        name,
                        iteration,
                        error,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Requests corrections for every manifest that failed this iteration
pub struct FixManifestsStep {
    fixer: Fixer,
}

impl FixManifestsStep {
    pub fn new(fixer: Fixer) -> Self {
        Self { fixer }
    }
}

#[async_trait]
impl Step for FixManifestsStep {
    fn name(&self) -> &str {
        "fix-manifests"
    }

    async fn run(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        if !state.iterations_remain() {
            return Ok(());
        }

        let failed: Vec<String> = state
            .pending_manifests()
            .filter(|m| !m.error_log.is_empty())
            .map(|m| m.name.clone())
            .collect();

        for name in failed {
            let request = {
                let Some(manifest) = state.manifests.get(&name) else {
                    continue;
                };
                FixRequest::new(
                    ArtifactKind::Manifest,
                    &manifest.content,
                    &manifest.error_log,
                    state.repository_tree(),
                )
                .with_related(&state.dockerfile.content)
            };

            let fixed = match self.fixer.request(&name, &request).await {
                Ok(fixed) => fixed,
                Err(e) => {
                    warn!("Keeping current manifest {}: {}", name, e);
                    continue;
                }
            };

            if let Some(manifest) = state.manifests.get_mut(&name) {
                // A fix may rename the object; keep the old identity if it no longer parses
                match parse_manifest(&name, fixed.clone(), &manifest.path) {
                    Ok(parsed) => {
                        manifest.resource = parsed.resource;
                        manifest.is_deployment_type = parsed.is_deployment_type;
                    }
                    Err(e) => debug!("Fixed manifest {} not re-parsed: {}", name, e),
                }
                manifest.content = fixed;
            }
        }
        Ok(())
    }
}

fn non_empty(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}
