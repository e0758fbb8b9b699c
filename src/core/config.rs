//! Run configuration from YAML

use crate::execution::{commit::CommitPolicy, scheduler::SchedulingStrategy};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level run configuration loaded from YAML
///
/// Every field has a default, so an empty document is a valid configuration
/// for the current directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Repository root; used as build context and scan root
    #[serde(default = "default_repository")]
    pub repository: PathBuf,

    /// Image reference to build (defaults to `<repository dir name>:latest`)
    #[serde(default)]
    pub image: Option<String>,

    /// Registry the image is pushed to so the cluster can pull it
    #[serde(default)]
    pub registry: Option<String>,

    #[serde(default)]
    pub dockerfile: DockerfileConfig,

    #[serde(default)]
    pub kubernetes: KubernetesConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub commit: CommitConfig,
}

/// Dockerfile loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockerfileConfig {
    /// Dockerfile location, relative to the repository unless absolute
    #[serde(default = "default_dockerfile_path")]
    pub path: PathBuf,

    /// Maximum build-and-fix iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

/// Kubernetes loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KubernetesConfig {
    /// Manifest directory, relative to the repository unless absolute
    #[serde(default = "default_manifest_dir")]
    pub manifest_dir: PathBuf,

    /// Maximum deploy-and-fix iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Namespace passed to kubectl
    #[serde(default)]
    pub namespace: Option<String>,

    /// How manifests are applied within one iteration
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Concurrent applies when `strategy` is `parallel-limited`
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

/// Apply strategy as written in the configuration file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    Sequential,
    Parallel,
    ParallelLimited,
}

/// Per-call timeouts in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    #[serde(default = "default_build_secs")]
    pub build_secs: u64,
    /// Budget shared by tagging and pushing the built image
    #[serde(default = "default_publish_secs")]
    pub publish_secs: u64,
    #[serde(default = "default_apply_secs")]
    pub apply_secs: u64,
    #[serde(default = "default_ready_secs")]
    pub ready_secs: u64,
    #[serde(default = "default_fix_secs")]
    pub fix_secs: u64,
}

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Agent executable
    #[serde(default = "default_agent_command")]
    pub command: String,

    /// Arguments placed before the prompt
    #[serde(default = "default_agent_args")]
    pub args: Vec<String>,

    /// Fix-request attempts within a single iteration
    #[serde(default = "default_fix_retries")]
    pub fix_retries: usize,
}

/// Commit settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitConfig {
    #[serde(default)]
    pub policy: CommitPolicy,
}

/// Values given on the command line, which take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub repository: Option<PathBuf>,
    pub dockerfile: Option<PathBuf>,
    pub manifest_dir: Option<PathBuf>,
    pub image: Option<String>,
    pub registry: Option<String>,
    pub max_build_iterations: Option<usize>,
    pub max_deploy_iterations: Option<usize>,
    pub strategy: Option<StrategyKind>,
    pub best_effort: bool,
}

fn default_repository() -> PathBuf {
    PathBuf::from(".")
}

fn default_dockerfile_path() -> PathBuf {
    PathBuf::from("Dockerfile")
}

fn default_manifest_dir() -> PathBuf {
    PathBuf::from("manifests")
}

fn default_max_iterations() -> usize {
    5
}

fn default_parallelism() -> usize {
    4
}

fn default_build_secs() -> u64 {
    900
}

fn default_publish_secs() -> u64 {
    600
}

fn default_apply_secs() -> u64 {
    120
}

fn default_ready_secs() -> u64 {
    180
}

fn default_fix_secs() -> u64 {
    300
}

fn default_agent_command() -> String {
    "pi".to_string()
}

fn default_agent_args() -> Vec<String> {
    vec![
        "--mode".to_string(),
        "text".to_string(),
        "--print".to_string(),
        "--no-session".to_string(),
    ]
}

fn default_fix_retries() -> usize {
    1
}

impl Default for DockerfileConfig {
    fn default() -> Self {
        Self {
            path: default_dockerfile_path(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            manifest_dir: default_manifest_dir(),
            max_iterations: default_max_iterations(),
            namespace: None,
            strategy: StrategyKind::default(),
            parallelism: default_parallelism(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            build_secs: default_build_secs(),
            publish_secs: default_publish_secs(),
            apply_secs: default_apply_secs(),
            ready_secs: default_ready_secs(),
            fix_secs: default_fix_secs(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            args: default_agent_args(),
            fix_retries: default_fix_retries(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            image: None,
            registry: None,
            dockerfile: DockerfileConfig::default(),
            kubernetes: KubernetesConfig::default(),
            timeouts: TimeoutConfig::default(),
            agent: AgentConfig::default(),
            commit: CommitConfig::default(),
        }
    }
}

impl KubernetesConfig {
    /// Scheduling strategy for manifest applies
    pub fn scheduling(&self) -> SchedulingStrategy {
        match self.strategy {
            StrategyKind::Sequential => SchedulingStrategy::Sequential,
            StrategyKind::Parallel => SchedulingStrategy::Parallel,
            StrategyKind::ParallelLimited => SchedulingStrategy::LimitedParallel(self.parallelism),
        }
    }
}

impl TimeoutConfig {
    pub fn build(&self) -> Duration {
        Duration::from_secs(self.build_secs)
    }

    pub fn publish(&self) -> Duration {
        Duration::from_secs(self.publish_secs)
    }

    pub fn apply(&self) -> Duration {
        Duration::from_secs(self.apply_secs)
    }

    pub fn ready(&self) -> Duration {
        Duration::from_secs(self.ready_secs)
    }

    pub fn fix(&self) -> Duration {
        Duration::from_secs(self.fix_secs)
    }
}

impl RunConfig {
    /// Load run configuration from a YAML file
    ///
    /// A relative `repository` is taken relative to the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;

        let base = path.parent().filter(|dir| !dir.as_os_str().is_empty());
        if let (Some(base), true) = (base, config.repository.is_relative()) {
            config.repository = if config.repository == Path::new(".") {
                base.to_path_buf()
            } else {
                base.join(&config.repository)
            };
        }
        Ok(config)
    }

    /// Parse run configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping
        let config: RunConfig = if yaml.trim().is_empty() {
            RunConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the run configuration
    pub fn validate(&self) -> Result<()> {
        if self.dockerfile.max_iterations == 0 {
            anyhow::bail!("dockerfile.max_iterations must be at least 1");
        }
        if self.kubernetes.max_iterations == 0 {
            anyhow::bail!("kubernetes.max_iterations must be at least 1");
        }
        if self.agent.fix_retries == 0 {
            anyhow::bail!("agent.fix_retries must be at least 1");
        }
        if self.agent.command.trim().is_empty() {
            anyhow::bail!("agent.command must not be empty");
        }
        if self.kubernetes.parallelism == 0 {
            anyhow::bail!("kubernetes.parallelism must be at least 1");
        }

        let timeouts = [
            ("build_secs", self.timeouts.build_secs),
            ("publish_secs", self.timeouts.publish_secs),
            ("apply_secs", self.timeouts.apply_secs),
            ("ready_secs", self.timeouts.ready_secs),
            ("fix_secs", self.timeouts.fix_secs),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                anyhow::bail!("timeouts.{} must be greater than zero", name);
            }
        }

        if let Some(image) = &self.image {
            if image.trim().is_empty() || image.chars().any(char::is_whitespace) {
                anyhow::bail!("Invalid image reference: '{}'", image);
            }
        }

        Ok(())
    }

    /// Apply command-line overrides, then re-validate
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(repository) = overrides.repository {
            self.repository = repository;
        }
        if let Some(dockerfile) = overrides.dockerfile {
            self.dockerfile.path = dockerfile;
        }
        if let Some(manifest_dir) = overrides.manifest_dir {
            self.kubernetes.manifest_dir = manifest_dir;
        }
        if let Some(image) = overrides.image {
            self.image = Some(image);
        }
        if let Some(registry) = overrides.registry {
            self.registry = Some(registry);
        }
        if let Some(n) = overrides.max_build_iterations {
            self.dockerfile.max_iterations = n;
        }
        if let Some(n) = overrides.max_deploy_iterations {
            self.kubernetes.max_iterations = n;
        }
        if let Some(strategy) = overrides.strategy {
            self.kubernetes.strategy = strategy;
        }
        if overrides.best_effort {
            self.commit.policy = CommitPolicy::BestEffort;
        }
        self.validate()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.repository.join(path)
        }
    }

    /// Dockerfile location on disk
    pub fn dockerfile_path(&self) -> PathBuf {
        self.resolve(&self.dockerfile.path)
    }

    /// Manifest directory on disk
    pub fn manifest_dir(&self) -> PathBuf {
        self.resolve(&self.kubernetes.manifest_dir)
    }

    /// Image reference to build, before any registry prefix
    pub fn image_name(&self) -> String {
        if let Some(image) = &self.image {
            return image.clone();
        }

        let dir_name = std::fs::canonicalize(&self.repository)
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "app".to_string());

        let sanitized: String = dir_name
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
            .collect();
        let trimmed = sanitized.trim_matches(|c| c == '-' || c == '.');
        let name = if trimmed.is_empty() { "app" } else { trimmed };

        format!("{}:latest", name)
    }

    /// Image reference the cluster pulls, including the registry if set
    pub fn image_ref(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry.trim_end_matches('/'), self.image_name()),
            None => self.image_name(),
        }
    }
}
