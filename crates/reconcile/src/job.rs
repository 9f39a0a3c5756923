//! Mutation requests.
//!
//! Everything here is pure: it turns validated desired state into the exact
//! payloads Gate expects, and never talks to the network. Task-based kinds
//! are wrapped in a [`MutationJob`] posted to `/tasks`. Canary configs are
//! saved directly against the Kayenta endpoints. Pipeline templates have
//! their own endpoints, which answer with a task reference like `/tasks`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gatekit::GateRequest;
use serde::Serialize;
use serde_json::{Value, json};

use crate::document;
use crate::error::ValidationError;
use crate::permissions::{PermissionSet, build_permissions};
use crate::types::{ApplicationSpec, CanaryConfigSpec, ProjectSpec, ResourceKind};
use crate::validate::{Validator, validate_identifier};

/// Path accepting task submissions.
pub const TASKS_PATH: &str = "/tasks";

/// Path of the canary config collection.
pub const CANARY_CONFIG_PATH: &str = "/v2/canaryConfig";

/// Path of the v2 pipeline template collection.
pub const PIPELINE_TEMPLATES_PATH: &str = "/v2/pipelineTemplates";

/// Application fields carried by create and update jobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPayload {
    /// Application name.
    pub name: String,
    /// Owner email.
    pub email: String,
    /// Instance port.
    pub instance_port: u16,
    /// Comma-joined provider tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_providers: Option<String>,
    /// Access mapping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionSet>,
}

impl ApplicationPayload {
    /// Validate the name, then build permissions, then the payload.
    ///
    /// The steps run in that order and stop at the first failure.
    pub fn prepare(
        validator: &Validator,
        name: &str,
        spec: &ApplicationSpec,
    ) -> Result<Self, ValidationError> {
        validator.validate_application(name, &spec.cloud_providers)?;

        let permissions = if spec.permissions.is_empty() {
            None
        } else {
            Some(build_permissions(&spec.permissions)?)
        };

        let cloud_providers =
            (!spec.cloud_providers.is_empty()).then(|| spec.cloud_providers.join(","));

        Ok(Self {
            name: name.to_string(),
            email: spec.email.clone(),
            instance_port: spec.instance_port,
            cloud_providers,
            permissions,
        })
    }
}

/// Name-only application reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationRef {
    /// Application name.
    pub name: String,
}

/// Pipeline shown on a project dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPipeline {
    /// Pipeline config id.
    pub pipeline_config_id: String,
}

/// Project configuration block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Member applications.
    pub applications: Vec<String>,
    /// Cluster filters; always empty here.
    pub clusters: Vec<Value>,
    /// Dashboard pipelines.
    pub pipeline_configs: Vec<ProjectPipeline>,
}

/// Project fields carried by `upsertProject`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectPayload {
    /// Remote id, set when updating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Project name.
    pub name: String,
    /// Owner email.
    pub email: String,
    /// Configuration.
    pub config: ProjectConfig,
}

impl ProjectPayload {
    /// Validate the name and build the payload.
    pub fn prepare(name: &str, spec: &ProjectSpec) -> Result<Self, ValidationError> {
        validate_identifier(name)?;
        for app in &spec.applications {
            validate_identifier(app)?;
        }

        Ok(Self {
            id: None,
            name: name.to_string(),
            email: spec.email.clone(),
            config: ProjectConfig {
                applications: spec.applications.clone(),
                clusters: Vec::new(),
                pipeline_configs: spec
                    .pipeline_ids
                    .iter()
                    .map(|id| ProjectPipeline {
                        pipeline_config_id: id.clone(),
                    })
                    .collect(),
            },
        })
    }

    /// Same payload carrying a remote id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Project reference carried by `deleteProject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRef {
    /// Remote id.
    pub id: String,
    /// Project name.
    pub name: String,
}

/// One typed job inside a [`MutationJob`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobSpec {
    /// Create an application.
    CreateApplication {
        /// Application fields.
        application: ApplicationPayload,
    },
    /// Update an application's attributes.
    UpdateApplication {
        /// Application fields.
        application: ApplicationPayload,
    },
    /// Delete an application.
    DeleteApplication {
        /// Application to delete.
        application: ApplicationRef,
    },
    /// Save a new pipeline.
    SavePipeline {
        /// Base64 of the serialized pipeline document.
        pipeline: String,
        /// Owning application.
        application: String,
    },
    /// Replace an existing pipeline.
    UpdatePipeline {
        /// Base64 of the serialized pipeline document, id included.
        pipeline: String,
        /// Owning application.
        application: String,
    },
    /// Delete a pipeline by name.
    DeletePipeline {
        /// Owning application.
        application: String,
        /// Pipeline name.
        #[serde(rename = "pipelineName")]
        pipeline_name: String,
    },
    /// Create or update a project.
    UpsertProject {
        /// Project fields.
        project: ProjectPayload,
    },
    /// Delete a project.
    DeleteProject {
        /// Project to delete.
        project: ProjectRef,
    },
}

/// Body posted to `/tasks`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationJob {
    /// Jobs to run, in order.
    pub job: Vec<JobSpec>,
    /// Owner key: the application, or the project name.
    pub application: String,
    /// Human readable summary, e.g. `Create Application: demo`.
    pub description: String,
}

impl MutationJob {
    fn single(
        action: &str,
        kind: ResourceKind,
        name: &str,
        owner: impl Into<String>,
        spec: JobSpec,
    ) -> Self {
        Self {
            job: vec![spec],
            application: owner.into(),
            description: format!("{action} {}: {name}", kind.title()),
        }
    }

    /// `createApplication`.
    pub fn create_application(payload: ApplicationPayload) -> Self {
        let name = payload.name.clone();
        Self::single(
            "Create",
            ResourceKind::Application,
            &name,
            name.as_str(),
            JobSpec::CreateApplication {
                application: payload,
            },
        )
    }

    /// `updateApplication`.
    pub fn update_application(payload: ApplicationPayload) -> Self {
        let name = payload.name.clone();
        Self::single(
            "Update",
            ResourceKind::Application,
            &name,
            name.as_str(),
            JobSpec::UpdateApplication {
                application: payload,
            },
        )
    }

    /// `deleteApplication`.
    pub fn delete_application(name: &str) -> Self {
        Self::single(
            "Delete",
            ResourceKind::Application,
            name,
            name,
            JobSpec::DeleteApplication {
                application: ApplicationRef {
                    name: name.to_string(),
                },
            },
        )
    }

    /// `savePipeline` for a new pipeline.
    pub fn save_pipeline(
        application: &str,
        name: &str,
        document: &Value,
    ) -> Result<Self, ValidationError> {
        let pipeline = encode_document(&pipeline_document(application, name, None, document)?)?;
        Ok(Self::single(
            "Save",
            ResourceKind::Pipeline,
            name,
            application,
            JobSpec::SavePipeline {
                pipeline,
                application: application.to_string(),
            },
        ))
    }

    /// `updatePipeline` with the resolved id injected into the document.
    pub fn update_pipeline(
        application: &str,
        name: &str,
        id: &str,
        document: &Value,
    ) -> Result<Self, ValidationError> {
        let pipeline =
            encode_document(&pipeline_document(application, name, Some(id), document)?)?;
        Ok(Self::single(
            "Update",
            ResourceKind::Pipeline,
            name,
            application,
            JobSpec::UpdatePipeline {
                pipeline,
                application: application.to_string(),
            },
        ))
    }

    /// `deletePipeline`.
    pub fn delete_pipeline(application: &str, name: &str) -> Self {
        Self::single(
            "Delete",
            ResourceKind::Pipeline,
            name,
            application,
            JobSpec::DeletePipeline {
                application: application.to_string(),
                pipeline_name: name.to_string(),
            },
        )
    }

    /// `upsertProject`; the action word follows whether an id is set.
    pub fn upsert_project(payload: ProjectPayload) -> Self {
        let action = if payload.id.is_some() {
            "Update"
        } else {
            "Create"
        };
        let name = payload.name.clone();
        Self::single(
            action,
            ResourceKind::Project,
            &name,
            name.as_str(),
            JobSpec::UpsertProject { project: payload },
        )
    }

    /// `deleteProject`.
    pub fn delete_project(id: &str, name: &str) -> Self {
        Self::single(
            "Delete",
            ResourceKind::Project,
            name,
            name,
            JobSpec::DeleteProject {
                project: ProjectRef {
                    id: id.to_string(),
                    name: name.to_string(),
                },
            },
        )
    }

    /// The `POST /tasks` request carrying this job.
    pub fn to_request(&self) -> Result<GateRequest, ValidationError> {
        let body = serde_json::to_value(self).map_err(|e| ValidationError::InvalidDocument {
            reason: e.to_string(),
        })?;
        Ok(GateRequest::post(TASKS_PATH, body))
    }
}

/// Pipeline document with its identity fields set.
///
/// The document must be a JSON object; `name` and `application` always
/// follow the desired resource, `id` is set only for updates.
pub fn pipeline_document(
    application: &str,
    name: &str,
    id: Option<&str>,
    document: &Value,
) -> Result<Value, ValidationError> {
    validate_identifier(application)?;
    validate_identifier(name)?;

    if !(document.is_object() || document.is_null()) {
        return Err(ValidationError::InvalidDocument {
            reason: format!("pipeline {name} must be a JSON object"),
        });
    }

    let mut fields = vec![("name", json!(name)), ("application", json!(application))];
    if let Some(id) = id {
        fields.push(("id", json!(id)));
    }
    Ok(document::with_fields(document, &fields))
}

/// Canary config document with its identity fields set.
pub fn canary_config_document(
    name: &str,
    id: Option<&str>,
    spec: &CanaryConfigSpec,
) -> Result<Value, ValidationError> {
    validate_identifier(name)?;

    if !(spec.document.is_object() || spec.document.is_null()) {
        return Err(ValidationError::InvalidDocument {
            reason: format!("canary config {name} must be a JSON object"),
        });
    }

    let mut fields = vec![("name", json!(name)), ("applications", json!(spec.applications))];
    if let Some(id) = id {
        fields.push(("id", json!(id)));
    }
    Ok(document::with_fields(&spec.document, &fields))
}

/// Direct save of a canary config: `POST` when new, `PUT` by id otherwise.
pub fn save_canary_config(document: Value, id: Option<&str>) -> GateRequest {
    match id {
        Some(id) => GateRequest::put(format!("{CANARY_CONFIG_PATH}/{id}"), document),
        None => GateRequest::post(CANARY_CONFIG_PATH, document),
    }
}

/// Direct delete of a canary config.
pub fn delete_canary_config(id: &str) -> GateRequest {
    GateRequest::delete(format!("{CANARY_CONFIG_PATH}/{id}"))
}

/// Pipeline template document with its `id` set to the template name.
pub fn pipeline_template_document(name: &str, document: &Value) -> Result<Value, ValidationError> {
    validate_identifier(name)?;

    if !(document.is_object() || document.is_null()) {
        return Err(ValidationError::InvalidDocument {
            reason: format!("pipeline template {name} must be a JSON object"),
        });
    }

    Ok(document::with_fields(document, &[("id", json!(name))]))
}

/// Create a pipeline template. Gate answers with a task reference.
pub fn create_pipeline_template(document: Value) -> GateRequest {
    GateRequest::post(format!("{PIPELINE_TEMPLATES_PATH}/create"), document)
}

/// Replace the pipeline template with this id.
pub fn update_pipeline_template(id: &str, document: Value) -> GateRequest {
    GateRequest::post(format!("{PIPELINE_TEMPLATES_PATH}/update/{id}"), document)
}

/// Delete the pipeline template with this id.
pub fn delete_pipeline_template(id: &str) -> GateRequest {
    GateRequest::delete(format!("{PIPELINE_TEMPLATES_PATH}/{id}"))
}

/// Base64 of a document's compact JSON serialization.
pub fn encode_document(document: &Value) -> Result<String, ValidationError> {
    let raw = serde_json::to_vec(document).map_err(|e| ValidationError::InvalidDocument {
        reason: e.to_string(),
    })?;
    Ok(STANDARD.encode(raw))
}
