//! Manifest loading
//!
//! A manifest lists desired resources. TOML and JSON are accepted, picked by
//! file extension:
//!
//! ```toml
//! [[application]]
//! name = "demo"
//! email = "team@example.com"
//! cloud_providers = ["kubernetes"]
//!
//! [[application.permission]]
//! principal = "team-a"
//! accesses = ["READ", "WRITE"]
//!
//! [[pipeline_template]]
//! name = "deploy-v2"
//! file = "templates/deploy-v2.json"
//!
//! [[pipeline]]
//! application = "demo"
//! name = "deploy"
//! file = "pipelines/deploy.json"
//!
//! [[project]]
//! name = "platform"
//! email = "team@example.com"
//! applications = ["demo"]
//!
//! [[canary_config]]
//! name = "latency"
//! applications = ["demo"]
//! document = { judge = { name = "NetflixACAJudge-v1.0" } }
//! ```

use anyhow::{Context, Result, bail};
use reconcile::{
    ApplicationSpec, CanaryConfigSpec, DesiredResource, PermissionGrant, ProjectSpec,
    types::DEFAULT_INSTANCE_PORT,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApplicationEntry {
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default = "default_instance_port")]
    instance_port: u16,
    #[serde(default)]
    cloud_providers: Vec<String>,
    #[serde(default, rename = "permission")]
    permissions: Vec<PermissionGrant>,
}

fn default_instance_port() -> u16 {
    DEFAULT_INSTANCE_PORT
}

impl ApplicationEntry {
    fn into_resource(self) -> DesiredResource {
        let spec = ApplicationSpec {
            email: self.email,
            instance_port: self.instance_port,
            cloud_providers: self.cloud_providers,
            permissions: self.permissions,
        };
        DesiredResource::application(self.name, spec)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineEntry {
    application: String,
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    file: Option<PathBuf>,
    #[serde(default)]
    document: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectEntry {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: String,
    #[serde(default)]
    applications: Vec<String>,
    #[serde(default)]
    pipeline_ids: Vec<String>,
}

impl ProjectEntry {
    fn into_resource(self) -> DesiredResource {
        let spec = ProjectSpec {
            email: self.email,
            applications: self.applications,
            pipeline_ids: self.pipeline_ids,
        };
        with_hint(DesiredResource::project(self.name, spec), self.id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineTemplateEntry {
    name: String,
    #[serde(default)]
    file: Option<PathBuf>,
    #[serde(default)]
    document: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CanaryConfigEntry {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    applications: Vec<String>,
    #[serde(default)]
    file: Option<PathBuf>,
    #[serde(default)]
    document: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default, rename = "application")]
    applications: Vec<ApplicationEntry>,
    #[serde(default, rename = "pipeline")]
    pipelines: Vec<PipelineEntry>,
    #[serde(default, rename = "project")]
    projects: Vec<ProjectEntry>,
    #[serde(default, rename = "pipeline_template")]
    pipeline_templates: Vec<PipelineTemplateEntry>,
    #[serde(default, rename = "canary_config")]
    canary_configs: Vec<CanaryConfigEntry>,
}

/// Load a manifest file.
///
/// Resources come back in dependency order: applications, projects,
/// pipeline templates, pipelines, canary configs. Two entries with the same key are rejected.
pub fn load(path: &Path) -> Result<Vec<DesiredResource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read manifest {}", path.display()))?;

    let manifest = parse(path, &content)?;
    let resources = resolve(path, manifest)?;
    check_duplicates(&resources)?;

    log::debug!(
        "Loaded {} resources from {}",
        resources.len(),
        path.display()
    );
    Ok(resources)
}

fn parse(path: &Path, content: &str) -> Result<Manifest> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(content)
            .with_context(|| format!("Invalid JSON manifest {}", path.display()))
    } else {
        toml::from_str(content)
            .with_context(|| format!("Invalid TOML manifest {}", path.display()))
    }
}

fn resolve(path: &Path, manifest: Manifest) -> Result<Vec<DesiredResource>> {
    let mut resources = Vec::new();

    resources.extend(
        manifest
            .applications
            .into_iter()
            .map(ApplicationEntry::into_resource),
    );
    resources.extend(manifest.projects.into_iter().map(ProjectEntry::into_resource));

    for entry in manifest.pipeline_templates {
        let label = format!("pipeline template {}", entry.name);
        let document = load_document(path, &label, entry.file, entry.document)?;
        resources.push(DesiredResource::pipeline_template(entry.name, document));
    }

    for entry in manifest.pipelines {
        let label = format!("pipeline {}/{}", entry.application, entry.name);
        let document = load_document(path, &label, entry.file, entry.document)?;
        resources.push(with_hint(
            DesiredResource::pipeline(entry.application, entry.name, document),
            entry.id,
        ));
    }

    for entry in manifest.canary_configs {
        let label = format!("canary config {}", entry.name);
        let document = load_document(path, &label, entry.file, entry.document)?;
        let spec = CanaryConfigSpec {
            applications: entry.applications,
            document,
        };
        resources.push(with_hint(
            DesiredResource::canary_config(entry.name, spec),
            entry.id,
        ));
    }

    Ok(resources)
}

fn with_hint(resource: DesiredResource, id: Option<String>) -> DesiredResource {
    match id {
        Some(id) if !id.is_empty() => resource.with_id_hint(id),
        _ => resource,
    }
}

/// Inline `document` or the JSON file named by `file`, never both.
fn load_document(
    manifest: &Path,
    label: &str,
    file: Option<PathBuf>,
    inline: Option<Value>,
) -> Result<Value> {
    match (file, inline) {
        (Some(_), Some(_)) => bail!("{label}: set either `file` or `document`, not both"),
        (None, Some(document)) => Ok(document),
        (None, None) => Ok(Value::Null),
        (Some(file), None) => {
            let full = paths::relative_to(manifest, &file);
            let content = fs::read_to_string(&full)
                .with_context(|| format!("{label}: could not read {}", full.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("{label}: invalid JSON in {}", full.display()))
        }
    }
}

fn check_duplicates(resources: &[DesiredResource]) -> Result<()> {
    let mut seen = HashSet::new();
    for resource in resources {
        let key = resource.key();
        if !seen.insert(key.clone()) {
            bail!("Duplicate resource {key} in manifest");
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
