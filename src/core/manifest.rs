//! Kubernetes manifest discovery

use crate::core::{
    error::PipelineError,
    state::{ManifestRecord, ResourceRef},
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Kinds that expose a rollout status and must pass a readiness check
const WORKLOAD_KINDS: &[&str] = &["Deployment", "StatefulSet", "DaemonSet"];

#[derive(Debug, Default, Deserialize)]
struct ManifestHeader {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    metadata: Option<ManifestMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ManifestMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
}

/// Whether a manifest kind is a workload polled for readiness
pub fn is_workload_kind(kind: &str) -> bool {
    WORKLOAD_KINDS.contains(&kind)
}

/// Namespace declared in the first document, if the manifest parses
pub fn declared_namespace(content: &str) -> Option<String> {
    let document = serde_yaml::Deserializer::from_str(content).next()?;
    ManifestHeader::deserialize(document)
        .ok()?
        .metadata?
        .namespace
        .filter(|ns| !ns.trim().is_empty())
}

/// Build a manifest record from file content
///
/// Only the first YAML document is inspected. A document without `kind` is
/// rejected since it cannot be applied.
pub fn parse_manifest(
    name: &str,
    content: String,
    path: &Path,
) -> Result<ManifestRecord, PipelineError> {
    let document = serde_yaml::Deserializer::from_str(&content)
        .next()
        .ok_or_else(|| PipelineError::config(format!("Manifest {} is empty", path.display())))?;

    let header = ManifestHeader::deserialize(document).map_err(|e| {
        PipelineError::config(format!("Manifest {} is not valid YAML: {}", path.display(), e))
    })?;

    let kind = header
        .kind
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            PipelineError::config(format!("Manifest {} does not declare a kind", path.display()))
        })?;

    let metadata = header.metadata.unwrap_or_default();
    let resource = metadata.name.map(|resource_name| ResourceRef {
        kind: kind.clone(),
        name: resource_name,
        namespace: metadata.namespace,
    });

    let mut record = ManifestRecord::new(name.to_string(), content, path.to_path_buf());
    record.is_deployment_type = is_workload_kind(&kind);
    record.resource = resource;
    Ok(record)
}

/// Discover every `*.yaml` / `*.yml` manifest directly inside `dir`
///
/// Manifests are keyed by file stem. Finding none is an error: an empty set
/// must never be mistaken for a fully deployed one.
pub fn discover_manifests(dir: &Path) -> Result<BTreeMap<String, ManifestRecord>, PipelineError> {
    info!("Discovering manifests in {}", dir.display());

    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if path.is_file() && is_yaml {
            paths.push(path);
        }
    }
    paths.sort();

    let mut manifests = BTreeMap::new();
    for path in paths {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                PipelineError::config(format!("Invalid manifest file name: {}", path.display()))
            })?
            .to_string();

        if manifests.contains_key(&name) {
            return Err(PipelineError::config(format!(
                "Duplicate manifest name '{}' in {}",
                name,
                dir.display()
            )));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| PipelineError::io(&path, e))?;
        let record = parse_manifest(&name, content, &path)?;
        debug!(
            "Discovered manifest {} (workload: {})",
            record.name, record.is_deployment_type
        );
        manifests.insert(name, record);
    }

    if manifests.is_empty() {
        return Err(PipelineError::config(format!(
            "No Kubernetes manifests found in {}",
            dir.display()
        )));
    }

    info!("Discovered {} manifests", manifests.len());
    Ok(manifests)
}
