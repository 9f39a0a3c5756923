//! Core types for reconciliation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default port recorded on new applications.
pub const DEFAULT_INSTANCE_PORT: u16 = 80;

/// Kind of resource managed on the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Spinnaker application.
    Application,
    /// Pipeline owned by an application.
    Pipeline,
    /// Project grouping applications.
    Project,
    /// Kayenta canary configuration.
    CanaryConfig,
    /// Managed pipeline template (v2).
    PipelineTemplate,
}

impl ResourceKind {
    /// All kinds, in dependency order (applications first).
    pub fn all() -> &'static [ResourceKind] {
        &[
            Self::Application,
            Self::Project,
            Self::PipelineTemplate,
            Self::Pipeline,
            Self::CanaryConfig,
        ]
    }

    /// Name used in job descriptions.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Application => "Application",
            Self::Pipeline => "Pipeline",
            Self::Project => "Project",
            Self::CanaryConfig => "Canary Config",
            Self::PipelineTemplate => "Pipeline Template",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Application => "application",
            Self::Pipeline => "pipeline",
            Self::Project => "project",
            Self::CanaryConfig => "canary-config",
            Self::PipelineTemplate => "pipeline-template",
        };
        f.write_str(name)
    }
}

/// Access granted to one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// User or group name.
    #[serde(alias = "user")]
    pub principal: String,
    /// Access levels as declared (`READ`, `WRITE`, `EXECUTE`).
    pub accesses: Vec<String>,
}

impl PermissionGrant {
    /// Create a grant.
    pub fn new(principal: impl Into<String>, accesses: &[&str]) -> Self {
        Self {
            principal: principal.into(),
            accesses: accesses.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

/// Desired application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    /// Owner email.
    #[serde(default)]
    pub email: String,
    /// Port instances listen on.
    #[serde(default = "default_instance_port")]
    pub instance_port: u16,
    /// Cloud providers the application deploys to.
    #[serde(default)]
    pub cloud_providers: Vec<String>,
    /// Per-principal access grants.
    #[serde(default, rename = "permission")]
    pub permissions: Vec<PermissionGrant>,
}

fn default_instance_port() -> u16 {
    DEFAULT_INSTANCE_PORT
}

impl Default for ApplicationSpec {
    fn default() -> Self {
        Self {
            email: String::new(),
            instance_port: DEFAULT_INSTANCE_PORT,
            cloud_providers: Vec::new(),
            permissions: Vec::new(),
        }
    }
}

/// Desired pipeline: an opaque document owned by an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Owning application.
    pub application: String,
    /// Pipeline definition as stored by the control plane.
    pub document: Value,
}

/// Desired project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Owner email.
    #[serde(default)]
    pub email: String,
    /// Applications in the project.
    #[serde(default)]
    pub applications: Vec<String>,
    /// Pipeline ids shown on the project dashboard.
    #[serde(default)]
    pub pipeline_ids: Vec<String>,
}

/// Desired canary configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanaryConfigSpec {
    /// Applications allowed to use the config.
    #[serde(default)]
    pub applications: Vec<String>,
    /// Canary config body (metrics, classifier, judge).
    pub document: Value,
}

/// Desired pipeline template: an opaque v2 template document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTemplateSpec {
    /// Template body (schema, variables, pipeline).
    pub document: Value,
}

/// Kind-specific content of a desired resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDocument {
    /// Structured application fields.
    Application(ApplicationSpec),
    /// Opaque pipeline document.
    Pipeline(PipelineSpec),
    /// Structured project fields.
    Project(ProjectSpec),
    /// Opaque canary config document.
    CanaryConfig(CanaryConfigSpec),
    /// Opaque pipeline template document.
    PipelineTemplate(PipelineTemplateSpec),
}

/// A user-declared target state for one remote resource.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredResource {
    /// Unique name within its kind (and owning application for pipelines).
    pub name: String,
    /// Kind-specific content.
    pub document: ResourceDocument,
    /// Remote identifier known from a previous run.
    pub id_hint: Option<String>,
}

impl DesiredResource {
    /// Desired application.
    pub fn application(name: impl Into<String>, spec: ApplicationSpec) -> Self {
        Self {
            name: name.into(),
            document: ResourceDocument::Application(spec),
            id_hint: None,
        }
    }

    /// Desired pipeline.
    pub fn pipeline(
        application: impl Into<String>,
        name: impl Into<String>,
        document: Value,
    ) -> Self {
        Self {
            name: name.into(),
            document: ResourceDocument::Pipeline(PipelineSpec {
                application: application.into(),
                document,
            }),
            id_hint: None,
        }
    }

    /// Desired project.
    pub fn project(name: impl Into<String>, spec: ProjectSpec) -> Self {
        Self {
            name: name.into(),
            document: ResourceDocument::Project(spec),
            id_hint: None,
        }
    }

    /// Desired canary config.
    pub fn canary_config(name: impl Into<String>, spec: CanaryConfigSpec) -> Self {
        Self {
            name: name.into(),
            document: ResourceDocument::CanaryConfig(spec),
            id_hint: None,
        }
    }

    /// Desired pipeline template.
    pub fn pipeline_template(name: impl Into<String>, document: Value) -> Self {
        Self {
            name: name.into(),
            document: ResourceDocument::PipelineTemplate(PipelineTemplateSpec { document }),
            id_hint: None,
        }
    }

    /// Attach a known remote identifier.
    #[must_use]
    pub fn with_id_hint(mut self, id: impl Into<String>) -> Self {
        self.id_hint = Some(id.into());
        self
    }

    /// Resource kind.
    pub fn kind(&self) -> ResourceKind {
        match self.document {
            ResourceDocument::Application(_) => ResourceKind::Application,
            ResourceDocument::Pipeline(_) => ResourceKind::Pipeline,
            ResourceDocument::Project(_) => ResourceKind::Project,
            ResourceDocument::CanaryConfig(_) => ResourceKind::CanaryConfig,
            ResourceDocument::PipelineTemplate(_) => ResourceKind::PipelineTemplate,
        }
    }

    /// Application that owns the resource; empty when not application-scoped.
    pub fn owner(&self) -> &str {
        match &self.document {
            ResourceDocument::Application(_) => &self.name,
            ResourceDocument::Pipeline(spec) => &spec.application,
            ResourceDocument::Project(_)
            | ResourceDocument::CanaryConfig(_)
            | ResourceDocument::PipelineTemplate(_) => "",
        }
    }

    /// Stable key such as `pipeline:demo/deploy`, used in logs and plans.
    pub fn key(&self) -> String {
        match &self.document {
            ResourceDocument::Pipeline(spec) => {
                format!("{}:{}/{}", self.kind(), spec.application, self.name)
            }
            _ => format!("{}:{}", self.kind(), self.name),
        }
    }
}

/// Classified outcome of reading one resource.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteLookupResult {
    /// `200` with a document.
    Found {
        /// Remote identifier, when one could be resolved.
        id: Option<String>,
        /// Remote document (`Value::Null` for an empty body).
        document: Value,
    },
    /// `404`, or absent from a listing.
    NotFound,
    /// The read failed below the HTTP layer.
    TransportError(String),
    /// Any other status.
    UnexpectedStatus {
        /// HTTP status code.
        code: u16,
        /// Response body, verbatim.
        body: String,
    },
}

/// What to do when the remote object already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Update it in place using its resolved identifier.
    #[default]
    UpdateExisting,
    /// Treat its existence as already satisfying the desired state.
    SkipExisting,
}

/// Why a reconciliation ended without a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Remote document already contains the desired one.
    UpToDate,
    /// Create-only policy and the object exists.
    AlreadyExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => f.write_str("up to date"),
            Self::AlreadyExists => f.write_str("already exists"),
        }
    }
}

/// Decision taken after probing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Nothing to send.
    Skip(SkipReason),
    /// Create a new object.
    Create,
    /// Update the object with this identifier.
    Update {
        /// Resolved remote identifier.
        id: String,
    },
    /// Delete the object with this identifier.
    Delete {
        /// Resolved remote identifier.
        id: String,
    },
    /// Delete requested but the object does not exist.
    AlreadyAbsent,
}

impl Action {
    /// Whether this action sends a mutation.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create | Self::Update { .. } | Self::Delete { .. }
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip(reason) => write!(f, "skip ({reason})"),
            Self::Create => f.write_str("create"),
            Self::Update { id } => write!(f, "update {id}"),
            Self::Delete { id } => write!(f, "delete {id}"),
            Self::AlreadyAbsent => f.write_str("already absent"),
        }
    }
}

/// Terminal result of a successful reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Nothing was submitted.
    NoChange,
    /// A new object was created.
    Created,
    /// An existing object was updated.
    Updated,
    /// The object was deleted.
    Deleted,
    /// Delete requested for an object that does not exist.
    AlreadyAbsent,
}

impl Outcome {
    /// Whether the control plane was changed.
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }
}
