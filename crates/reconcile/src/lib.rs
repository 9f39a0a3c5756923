//! # reconcile
//!
//! Reconciliation and task-completion engine for Spinnaker Gate resources.
//!
//! Given a desired application, pipeline, pipeline template, project or
//! canary config, the [`Reconciler`] decides whether Gate already holds a
//! matching object, builds the mutation that converges it, submits it and
//! waits for the resulting task to finish.
//!
//! The pieces, leaf first:
//! - [`Validator`]: per-provider name rules plus a plain identifier rule
//! - [`build_permissions`]: merges grants into a [`PermissionSet`]
//! - [`MutationJob`]: typed `/tasks` payloads
//! - [`Prober`]: classifies a read into found, not found or failure
//! - [`Reconciler`]: the decision state machine
//! - [`TaskWaiter`]: polls a task to a terminal status
//!
//! ## Example
//!
//! ```no_run
//! use gatekit::{GateConfig, HttpGate};
//! use reconcile::{ApplicationSpec, ConstraintSet, DesiredResource, Reconciler, Validator};
//!
//! let gate = HttpGate::new(GateConfig::new("https://gate.example.com")).unwrap();
//! let validator = Validator::new(&ConstraintSet::builtin()).unwrap();
//! let reconciler = Reconciler::new(gate, validator);
//!
//! let app = DesiredResource::application(
//!     "demo",
//!     ApplicationSpec {
//!         email: "team@example.com".into(),
//!         cloud_providers: vec!["kubernetes".into()],
//!         ..ApplicationSpec::default()
//!     },
//! );
//! let outcome = reconciler.apply(&app).unwrap();
//! println!("{outcome:?}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod job;
pub mod permissions;
pub mod probe;
pub mod reconciler;
pub mod retry;
pub mod types;
pub mod validate;
pub mod waiter;

pub use error::{Error, ErrorCategory, Result, ValidationError};
pub use job::{ApplicationPayload, JobSpec, MutationJob, ProjectPayload};
pub use permissions::{AccessLevel, PermissionSet, build_permissions};
pub use probe::Prober;
pub use reconciler::{Prepared, Reconciler, prepare};
pub use retry::RetryBudget;
pub use types::{
    Action, ApplicationSpec, CanaryConfigSpec, ConflictPolicy, DesiredResource, Outcome,
    PermissionGrant, PipelineSpec, PipelineTemplateSpec, ProjectSpec, RemoteLookupResult,
    ResourceDocument, ResourceKind, SkipReason,
};
pub use validate::{ConstraintSet, NameConstraint, Validator, validate_identifier};
pub use waiter::{Backoff, CancelToken, MIN_POLL_INTERVAL, TaskWaiter, WaitConfig};
