//! Reconciliation of one desired resource against Gate.
//!
//! Every call follows the same path: validate locally, probe, decide, build
//! the mutation, submit it, then wait for the task. Validation runs before
//! anything touches the network.
//!
//! ```text
//! Start -> Probing -> Skip | Creating | Updating | Deleting
//!                        -> Submitted -> Awaiting -> Succeeded | Failed
//! ```

use gatekit::{Gate, GateRequest, TaskAccepted};
use serde_json::Value;

use crate::document::{is_empty_document, json_contains};
use crate::error::{Error, Result, ValidationError};
use crate::job::{
    self, ApplicationPayload, MutationJob, ProjectPayload, canary_config_document,
    pipeline_document, pipeline_template_document,
};
use crate::probe::{Prober, comparable_document};
use crate::types::{
    Action, ConflictPolicy, DesiredResource, Outcome, RemoteLookupResult, ResourceDocument,
    ResourceKind, SkipReason,
};
use crate::validate::{Validator, validate_identifier};
use crate::waiter::{CancelToken, TaskWaiter, WaitConfig};

/// Desired state after validation, ready to be turned into a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// Application fields, permissions resolved.
    Application(ApplicationPayload),
    /// Pipeline document with `name` and `application` set.
    Pipeline {
        /// Owning application.
        application: String,
        /// Pipeline document.
        document: Value,
    },
    /// Project fields.
    Project(ProjectPayload),
    /// Canary config document with `name` and `applications` set.
    CanaryConfig(Value),
    /// Pipeline template document with `id` set.
    PipelineTemplate(Value),
}

impl Prepared {
    /// The document a found remote object must contain to be up to date.
    pub fn comparable(&self) -> Value {
        match self {
            Self::Application(payload) => serde_json::to_value(payload).unwrap_or(Value::Null),
            Self::Project(payload) => serde_json::to_value(payload).unwrap_or(Value::Null),
            Self::Pipeline { document, .. }
            | Self::CanaryConfig(document)
            | Self::PipelineTemplate(document) => document.clone(),
        }
    }
}

/// Validate a desired resource and build its prepared form.
///
/// Runs the name rules, then permissions, then the payload builder. Never
/// touches the network.
pub fn prepare(
    validator: &Validator,
    desired: &DesiredResource,
) -> std::result::Result<Prepared, ValidationError> {
    match &desired.document {
        ResourceDocument::Application(spec) => Ok(Prepared::Application(
            ApplicationPayload::prepare(validator, &desired.name, spec)?,
        )),
        ResourceDocument::Pipeline(spec) => Ok(Prepared::Pipeline {
            application: spec.application.clone(),
            document: pipeline_document(&spec.application, &desired.name, None, &spec.document)?,
        }),
        ResourceDocument::Project(spec) => Ok(Prepared::Project(ProjectPayload::prepare(
            &desired.name,
            spec,
        )?)),
        ResourceDocument::CanaryConfig(spec) => Ok(Prepared::CanaryConfig(
            canary_config_document(&desired.name, None, spec)?,
        )),
        ResourceDocument::PipelineTemplate(spec) => Ok(Prepared::PipelineTemplate(
            pipeline_template_document(&desired.name, &spec.document)?,
        )),
    }
}

/// Drives desired resources to their target state.
///
/// One reconciler can be shared across threads; each call is an independent
/// blocking flow over the shared Gate handle.
pub struct Reconciler<G: Gate> {
    gate: G,
    validator: Validator,
    wait: WaitConfig,
    policy: ConflictPolicy,
    cancel: CancelToken,
}

impl<G: Gate> Reconciler<G> {
    /// Create a reconciler with default wait settings and policy.
    pub fn new(gate: G, validator: Validator) -> Self {
        Self {
            gate,
            validator,
            wait: WaitConfig::default(),
            policy: ConflictPolicy::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Set how tasks are awaited.
    #[must_use]
    pub fn with_wait_config(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    /// Set what happens when the remote object already exists.
    #[must_use]
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Observe a cancellation token while waiting for tasks.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// The Gate handle.
    pub fn gate(&self) -> &G {
        &self.gate
    }

    /// Validate a desired resource without any network call.
    pub fn prepare(&self, desired: &DesiredResource) -> std::result::Result<Prepared, ValidationError> {
        prepare(&self.validator, desired)
    }

    /// Decide what [`apply`](Self::apply) would do, without submitting.
    pub fn plan(&self, desired: &DesiredResource) -> Result<Action> {
        let prepared = self.prepare(desired)?;
        let lookup = self.probe(desired);
        self.decide(desired, &prepared, lookup)
    }

    /// Converge one resource to its desired state.
    pub fn apply(&self, desired: &DesiredResource) -> Result<Outcome> {
        let prepared = self.prepare(desired)?;
        let lookup = self.probe(desired);
        let action = self.decide(desired, &prepared, lookup)?;
        log::debug!("{}: {action}", desired.key());

        match action {
            Action::Create => {
                self.create(desired, prepared)?;
                Ok(Outcome::Created)
            }
            Action::Update { id } => {
                self.update(desired, prepared, &id)?;
                Ok(Outcome::Updated)
            }
            // decide() only yields skip, create or update
            Action::Skip(_) | Action::Delete { .. } | Action::AlreadyAbsent => Ok(Outcome::NoChange),
        }
    }

    /// Decide what [`destroy`](Self::destroy) would do, without submitting.
    pub fn plan_destroy(&self, desired: &DesiredResource) -> Result<Action> {
        validate_target(desired)?;

        match self.probe(desired) {
            RemoteLookupResult::TransportError(cause) => Err(Error::Transport { cause }),
            RemoteLookupResult::UnexpectedStatus { code, body } => {
                Err(Error::UnexpectedStatus { code, body })
            }
            RemoteLookupResult::NotFound => Ok(Action::AlreadyAbsent),
            RemoteLookupResult::Found { document, .. }
                if desired.kind() == ResourceKind::Pipeline && is_empty_document(&document) =>
            {
                Ok(Action::AlreadyAbsent)
            }
            RemoteLookupResult::Found { id, .. } => {
                let id = id.or_else(|| desired.id_hint.clone());
                match (desired.kind(), id) {
                    (_, Some(id)) => Ok(Action::Delete { id }),
                    (ResourceKind::Application | ResourceKind::Pipeline, None) => {
                        Ok(Action::Delete {
                            id: desired.name.clone(),
                        })
                    }
                    (kind, None) => Err(Error::Conflict {
                        kind,
                        name: desired.name.clone(),
                        reason: "no identifier could be resolved to delete it".to_string(),
                    }),
                }
            }
        }
    }

    /// Delete one resource. A resource that does not exist is a success.
    pub fn destroy(&self, desired: &DesiredResource) -> Result<Outcome> {
        let action = self.plan_destroy(desired)?;
        log::debug!("{}: {action}", desired.key());

        let Action::Delete { id } = action else {
            return Ok(Outcome::AlreadyAbsent);
        };

        match &desired.document {
            ResourceDocument::Application(_) => {
                self.submit(desired, &MutationJob::delete_application(&desired.name))?;
            }
            ResourceDocument::Pipeline(spec) => {
                self.submit(
                    desired,
                    &MutationJob::delete_pipeline(&spec.application, &desired.name),
                )?;
            }
            ResourceDocument::Project(_) => {
                self.submit(desired, &MutationJob::delete_project(&id, &desired.name))?;
            }
            ResourceDocument::CanaryConfig(_) => {
                self.send_direct(desired, &job::delete_canary_config(&id))?;
            }
            ResourceDocument::PipelineTemplate(_) => {
                self.submit_request(
                    desired,
                    &describe("Delete", desired),
                    &job::delete_pipeline_template(&id),
                )?;
            }
        }
        Ok(Outcome::Deleted)
    }

    /// Read the remote document of one resource.
    ///
    /// `application` is only used for pipelines.
    pub fn read(&self, kind: ResourceKind, application: &str, name: &str) -> Result<Value> {
        let prober = Prober::new(&self.gate);
        match prober.probe(kind, application, name, None) {
            RemoteLookupResult::Found { document, .. } if !is_empty_document(&document) => {
                Ok(document)
            }
            RemoteLookupResult::Found { .. } | RemoteLookupResult::NotFound => {
                Err(Error::NotFound {
                    kind,
                    name: name.to_string(),
                })
            }
            RemoteLookupResult::TransportError(cause) => Err(Error::Transport { cause }),
            RemoteLookupResult::UnexpectedStatus { code, body } => {
                Err(Error::UnexpectedStatus { code, body })
            }
        }
    }

    fn probe(&self, desired: &DesiredResource) -> RemoteLookupResult {
        log::debug!("{}: probing", desired.key());
        Prober::new(&self.gate).probe(
            desired.kind(),
            desired.owner(),
            &desired.name,
            desired.id_hint.as_deref(),
        )
    }

    fn decide(
        &self,
        desired: &DesiredResource,
        prepared: &Prepared,
        lookup: RemoteLookupResult,
    ) -> Result<Action> {
        let kind = desired.kind();
        match lookup {
            RemoteLookupResult::TransportError(cause) => Err(Error::Transport { cause }),
            RemoteLookupResult::UnexpectedStatus { code, body } => {
                Err(Error::UnexpectedStatus { code, body })
            }
            RemoteLookupResult::NotFound => Ok(Action::Create),
            RemoteLookupResult::Found { document, .. }
                if kind == ResourceKind::Pipeline && is_empty_document(&document) =>
            {
                log::debug!(
                    "{}: found with an empty document, treating as absent",
                    desired.key()
                );
                Ok(Action::Create)
            }
            RemoteLookupResult::Found { id, document } => {
                if self.policy == ConflictPolicy::SkipExisting {
                    return Ok(Action::Skip(SkipReason::AlreadyExists));
                }

                if json_contains(comparable_document(kind, &document), &prepared.comparable()) {
                    return Ok(Action::Skip(SkipReason::UpToDate));
                }

                match id.or_else(|| desired.id_hint.clone()) {
                    Some(id) => Ok(Action::Update { id }),
                    None => Err(Error::Conflict {
                        kind,
                        name: desired.name.clone(),
                        reason: "no identifier could be resolved to update it".to_string(),
                    }),
                }
            }
        }
    }

    fn create(&self, desired: &DesiredResource, prepared: Prepared) -> Result<()> {
        match prepared {
            Prepared::Application(payload) => {
                self.submit(desired, &MutationJob::create_application(payload))
            }
            Prepared::Pipeline {
                application,
                document,
            } => self.submit(
                desired,
                &MutationJob::save_pipeline(&application, &desired.name, &document)?,
            ),
            Prepared::Project(payload) => {
                self.submit(desired, &MutationJob::upsert_project(payload))
            }
            Prepared::CanaryConfig(document) => {
                self.send_direct(desired, &job::save_canary_config(document, None))
            }
            Prepared::PipelineTemplate(document) => self.submit_request(
                desired,
                &describe("Create", desired),
                &job::create_pipeline_template(document),
            ),
        }
    }

    fn update(&self, desired: &DesiredResource, prepared: Prepared, id: &str) -> Result<()> {
        match prepared {
            Prepared::Application(payload) => {
                self.submit(desired, &MutationJob::update_application(payload))
            }
            Prepared::Pipeline {
                application,
                document,
            } => self.submit(
                desired,
                &MutationJob::update_pipeline(&application, &desired.name, id, &document)?,
            ),
            Prepared::Project(payload) => {
                self.submit(desired, &MutationJob::upsert_project(payload.with_id(id)))
            }
            Prepared::CanaryConfig(document) => {
                let document = crate::document::with_fields(&document, &[("id", id.into())]);
                self.send_direct(desired, &job::save_canary_config(document, Some(id)))
            }
            Prepared::PipelineTemplate(document) => {
                let document = crate::document::with_fields(&document, &[("id", id.into())]);
                self.submit_request(
                    desired,
                    &describe("Update", desired),
                    &job::update_pipeline_template(id, document),
                )
            }
        }
    }

    /// Post a task and wait for it to finish.
    fn submit(&self, desired: &DesiredResource, job: &MutationJob) -> Result<()> {
        self.submit_request(desired, &job.description, &job.to_request()?)
    }

    /// Send a request answered with a task reference, then wait for the task.
    fn submit_request(
        &self,
        desired: &DesiredResource,
        description: &str,
        request: &GateRequest,
    ) -> Result<()> {
        log::info!("{}: {description}", desired.key());

        let response = self.gate.send(request)?;
        if !response.is_success() {
            return Err(Error::unexpected(&response));
        }
        let accepted: TaskAccepted = response.json_as()?;
        log::debug!("{}: submitted, awaiting task {}", desired.key(), accepted.reference);

        TaskWaiter::new(&self.gate, &self.wait)
            .with_cancel_token(&self.cancel)
            .await_task(&accepted.reference)?;
        log::debug!("{}: task {} succeeded", desired.key(), accepted.reference);
        Ok(())
    }

    /// Send a request acknowledged synchronously with a 2xx.
    fn send_direct(&self, desired: &DesiredResource, request: &GateRequest) -> Result<()> {
        log::info!("{}: {request}", desired.key());
        let response = self.gate.send(request)?;
        if !response.is_success() {
            return Err(Error::unexpected(&response));
        }
        Ok(())
    }
}

/// Identity checks needed before deleting.
fn validate_target(desired: &DesiredResource) -> std::result::Result<(), ValidationError> {
    if desired.name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    match &desired.document {
        ResourceDocument::Pipeline(spec) => {
            validate_identifier(&spec.application)?;
            validate_identifier(&desired.name)?;
        }
        ResourceDocument::PipelineTemplate(_) => validate_identifier(&desired.name)?,
        _ => {}
    }
    Ok(())
}

/// Log line for mutations sent outside `/tasks`, e.g. `Create Pipeline Template: x`.
fn describe(action: &str, desired: &DesiredResource) -> String {
    format!("{action} {}: {}", desired.kind().title(), desired.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApplicationSpec, CanaryConfigSpec, PermissionGrant, ProjectSpec};
    use crate::validate::ConstraintSet;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use gatekit::{Method, MockGate};
    use serde_json::json;
    use std::time::Duration;

    const PIPELINE_PATH: &str = "/applications/demo/pipelineConfigs/deploy";

    fn reconciler(mock: &MockGate) -> Reconciler<MockGate> {
        let validator = Validator::new(&ConstraintSet::builtin()).unwrap();
        Reconciler::new(mock.clone(), validator).with_wait_config(
            WaitConfig::default()
                .interval(Duration::from_millis(1))
                .timeout(Duration::from_secs(5)),
        )
    }

    fn accept_tasks(mock: &MockGate) {
        mock.on_json(Method::Post, "/tasks", 200, &json!({"ref": "/tasks/01H"}));
        mock.on_json(Method::Get, "/tasks/01H", 200, &json!({"status": "SUCCEEDED"}));
    }

    fn demo_app() -> DesiredResource {
        DesiredResource::application(
            "demo",
            ApplicationSpec {
                email: "team@example.com".into(),
                cloud_providers: vec!["kubernetes".into()],
                ..ApplicationSpec::default()
            },
        )
    }

    fn deploy_pipeline() -> DesiredResource {
        DesiredResource::pipeline(
            "demo",
            "deploy",
            json!({"stages": [{"type": "wait", "waitTime": 30}]}),
        )
    }

    fn submitted_job(mock: &MockGate) -> Value {
        let calls = mock.calls_to(Method::Post, "/tasks");
        assert_eq!(calls.len(), 1, "expected exactly one submitted task");
        calls[0].body.clone().unwrap()
    }

    fn decode_pipeline(job: &Value) -> Value {
        let encoded = job["job"][0]["pipeline"].as_str().unwrap();
        serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap()
    }

    #[test]
    fn test_application_created_when_absent() {
        let mock = MockGate::new();
        accept_tasks(&mock);

        let outcome = reconciler(&mock).apply(&demo_app()).unwrap();

        assert_eq!(outcome, Outcome::Created);
        let job = submitted_job(&mock);
        assert_eq!(job["job"][0]["type"], "createApplication");
        assert_eq!(job["job"][0]["application"]["cloudProviders"], "kubernetes");
        assert_eq!(job["description"], "Create Application: demo");
        assert_eq!(mock.calls_to(Method::Get, "/tasks/01H").len(), 1);
    }

    #[test]
    fn test_invalid_name_fails_before_any_call() {
        let mock = MockGate::new();
        let desired = DesiredResource::application(
            "Invalid Name!",
            ApplicationSpec {
                cloud_providers: vec!["kubernetes".into()],
                ..ApplicationSpec::default()
            },
        );

        let err = reconciler(&mock).apply(&desired).unwrap_err();

        assert!(matches!(
            err,
            Error::Validation(ValidationError::NamePatternMismatch { .. })
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_invalid_permissions_fail_before_any_call() {
        let mock = MockGate::new();
        let desired = DesiredResource::application(
            "demo",
            ApplicationSpec {
                permissions: vec![
                    PermissionGrant::new("ops", &["READ"]),
                    PermissionGrant::new("ops", &["READ"]),
                ],
                ..ApplicationSpec::default()
            },
        );

        let err = reconciler(&mock).apply(&desired).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::DuplicatePermission { .. })
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_pipeline_found_with_empty_body_is_created() {
        let mock = MockGate::new();
        mock.on(Method::Get, PIPELINE_PATH, 200, "");
        accept_tasks(&mock);

        let outcome = reconciler(&mock).apply(&deploy_pipeline()).unwrap();

        assert_eq!(outcome, Outcome::Created);
        let job = submitted_job(&mock);
        assert_eq!(job["job"][0]["type"], "savePipeline");
        assert_eq!(job["application"], "demo");
        assert_eq!(decode_pipeline(&job)["name"], "deploy");
    }

    #[test]
    fn test_pipeline_found_with_empty_object_is_created() {
        let mock = MockGate::new();
        mock.on(Method::Get, PIPELINE_PATH, 200, "{}");
        accept_tasks(&mock);

        assert_eq!(
            reconciler(&mock).apply(&deploy_pipeline()).unwrap(),
            Outcome::Created
        );
    }

    #[test]
    fn test_destroy_absent_resource_submits_nothing() {
        let mock = MockGate::new();

        let outcome = reconciler(&mock).destroy(&demo_app()).unwrap();

        assert_eq!(outcome, Outcome::AlreadyAbsent);
        assert_eq!(mock.mutation_count(), 0);
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_second_apply_is_no_change() {
        let mock = MockGate::new();
        mock.on(Method::Get, "/applications/demo", 404, "");
        mock.on_json(
            Method::Get,
            "/applications/demo",
            200,
            &json!({
                "name": "demo",
                "attributes": {
                    "name": "demo",
                    "email": "team@example.com",
                    "instancePort": 80,
                    "cloudProviders": "kubernetes",
                    "lastModifiedBy": "anonymous"
                }
            }),
        );
        accept_tasks(&mock);

        let reconciler = reconciler(&mock);
        assert_eq!(reconciler.apply(&demo_app()).unwrap(), Outcome::Created);
        assert_eq!(reconciler.apply(&demo_app()).unwrap(), Outcome::NoChange);
        assert_eq!(mock.mutation_count(), 1);
    }

    #[test]
    fn test_changed_pipeline_updated_with_resolved_id() {
        let mock = MockGate::new();
        mock.on_json(
            Method::Get,
            PIPELINE_PATH,
            200,
            &json!({
                "id": "p-1",
                "name": "deploy",
                "application": "demo",
                "stages": [{"type": "wait", "waitTime": 10}]
            }),
        );
        accept_tasks(&mock);

        let outcome = reconciler(&mock).apply(&deploy_pipeline()).unwrap();

        assert_eq!(outcome, Outcome::Updated);
        let job = submitted_job(&mock);
        assert_eq!(job["job"][0]["type"], "updatePipeline");
        let pipeline = decode_pipeline(&job);
        assert_eq!(pipeline["id"], "p-1");
        assert_eq!(pipeline["stages"][0]["waitTime"], 30);
    }

    #[test]
    fn test_unchanged_pipeline_skipped() {
        let mock = MockGate::new();
        mock.on_json(
            Method::Get,
            PIPELINE_PATH,
            200,
            &json!({
                "id": "p-1",
                "name": "deploy",
                "application": "demo",
                "index": 0,
                "stages": [{"type": "wait", "waitTime": 30}]
            }),
        );

        let reconciler = reconciler(&mock);
        assert_eq!(
            reconciler.plan(&deploy_pipeline()).unwrap(),
            Action::Skip(SkipReason::UpToDate)
        );
        assert_eq!(reconciler.apply(&deploy_pipeline()).unwrap(), Outcome::NoChange);
        assert_eq!(mock.mutation_count(), 0);
    }

    #[test]
    fn test_skip_existing_policy() {
        let mock = MockGate::new();
        mock.on_json(Method::Get, PIPELINE_PATH, 200, &json!({"id": "p-1", "name": "deploy"}));

        let reconciler = reconciler(&mock).with_policy(ConflictPolicy::SkipExisting);
        assert_eq!(
            reconciler.plan(&deploy_pipeline()).unwrap(),
            Action::Skip(SkipReason::AlreadyExists)
        );
        assert_eq!(reconciler.apply(&deploy_pipeline()).unwrap(), Outcome::NoChange);
        assert_eq!(mock.mutation_count(), 0);
    }

    #[test]
    fn test_found_without_identifier_is_conflict() {
        let mock = MockGate::new();
        mock.on_json(Method::Get, PIPELINE_PATH, 200, &json!({"name": "deploy"}));

        let err = reconciler(&mock).apply(&deploy_pipeline()).unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
        assert_eq!(mock.mutation_count(), 0);
    }

    #[test]
    fn test_id_hint_resolves_identifier() {
        let mock = MockGate::new();
        mock.on_json(Method::Get, PIPELINE_PATH, 200, &json!({"name": "deploy"}));

        let desired = deploy_pipeline().with_id_hint("p-7");
        assert_eq!(
            reconciler(&mock).plan(&desired).unwrap(),
            Action::Update { id: "p-7".into() }
        );
    }

    #[test]
    fn test_unexpected_probe_status_surfaced_verbatim() {
        let mock = MockGate::new();
        mock.on(Method::Get, "/applications/demo", 500, "front50 is down");

        let err = reconciler(&mock).apply(&demo_app()).unwrap_err();
        match err {
            Error::UnexpectedStatus { code, body } => {
                assert_eq!(code, 500);
                assert_eq!(body, "front50 is down");
            }
            other => panic!("expected UnexpectedStatus, got {other:?}"),
        }
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_probe_transport_error_not_retried() {
        let mock = MockGate::new();
        mock.fail(Method::Get, "/applications/demo", "connection refused");

        let err = reconciler(&mock).apply(&demo_app()).unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_submission_failure_never_polls() {
        let mock = MockGate::new();
        mock.on(Method::Post, "/tasks", 400, "Bad Request");

        let err = reconciler(&mock).apply(&demo_app()).unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus { code: 400, .. }));
        assert!(mock.calls_to(Method::Get, "/tasks/01H").is_empty());
    }

    #[test]
    fn test_task_failure_propagates() {
        let mock = MockGate::new();
        mock.on_json(Method::Post, "/tasks", 200, &json!({"ref": "/tasks/01H"}));
        mock.on_json(Method::Get, "/tasks/01H", 200, &json!({"status": "TERMINAL"}));

        let err = reconciler(&mock).apply(&demo_app()).unwrap_err();
        assert!(matches!(err, Error::TaskFailed { .. }));
    }

    #[test]
    fn test_cancelled_while_waiting() {
        let mock = MockGate::new();
        mock.on_json(Method::Post, "/tasks", 200, &json!({"ref": "/tasks/01H"}));
        mock.on_json(Method::Get, "/tasks/01H", 200, &json!({"status": "RUNNING"}));

        let token = CancelToken::new();
        token.cancel();
        let err = reconciler(&mock)
            .with_cancel_token(token)
            .apply(&demo_app())
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { .. }));
    }

    #[test]
    fn test_destroy_found_pipeline() {
        let mock = MockGate::new();
        mock.on_json(Method::Get, PIPELINE_PATH, 200, &json!({"id": "p-1", "name": "deploy"}));
        accept_tasks(&mock);

        let outcome = reconciler(&mock).destroy(&deploy_pipeline()).unwrap();

        assert_eq!(outcome, Outcome::Deleted);
        let job = submitted_job(&mock);
        assert_eq!(
            job["job"][0],
            json!({"type": "deletePipeline", "application": "demo", "pipelineName": "deploy"})
        );
    }

    #[test]
    fn test_project_update_carries_id() {
        let mock = MockGate::new();
        mock.on_json(
            Method::Get,
            "/projects/platform",
            200,
            &json!({"id": "42", "name": "platform", "email": "old@example.com"}),
        );
        accept_tasks(&mock);

        let desired = DesiredResource::project(
            "platform",
            ProjectSpec {
                email: "team@example.com".into(),
                applications: vec!["demo".into()],
                pipeline_ids: Vec::new(),
            },
        );
        let outcome = reconciler(&mock).apply(&desired).unwrap();

        assert_eq!(outcome, Outcome::Updated);
        let job = submitted_job(&mock);
        assert_eq!(job["job"][0]["type"], "upsertProject");
        assert_eq!(job["job"][0]["project"]["id"], "42");
        assert_eq!(job["description"], "Update Project: platform");
    }

    #[test]
    fn test_canary_config_saved_directly() {
        let mock = MockGate::new();
        mock.on_json(Method::Get, "/v2/canaryConfig", 200, &json!([]));
        mock.on_json(Method::Post, "/v2/canaryConfig", 200, &json!({"canaryConfigId": "c-1"}));

        let desired = DesiredResource::canary_config(
            "latency",
            CanaryConfigSpec {
                applications: vec!["demo".into()],
                document: json!({"metrics": []}),
            },
        );
        let outcome = reconciler(&mock).apply(&desired).unwrap();

        assert_eq!(outcome, Outcome::Created);
        assert!(mock.calls_to(Method::Post, "/tasks").is_empty());
        let calls = mock.calls_to(Method::Post, "/v2/canaryConfig");
        assert_eq!(calls[0].body.as_ref().unwrap()["name"], "latency");
    }

    #[test]
    fn test_canary_config_destroy_requires_id() {
        let mock = MockGate::new();
        mock.on_json(
            Method::Get,
            "/v2/canaryConfig",
            200,
            &json!([{"id": "c-1", "name": "latency"}]),
        );
        mock.on_json(Method::Get, "/v2/canaryConfig/c-1", 200, &json!({"name": "latency"}));
        mock.on(Method::Delete, "/v2/canaryConfig/c-1", 204, "");

        let desired = DesiredResource::canary_config(
            "latency",
            CanaryConfigSpec {
                applications: Vec::new(),
                document: json!({}),
            },
        );
        assert_eq!(
            reconciler(&mock).destroy(&desired).unwrap(),
            Outcome::Deleted
        );
        assert_eq!(mock.calls_to(Method::Delete, "/v2/canaryConfig/c-1").len(), 1);
    }

    fn deploy_template() -> DesiredResource {
        DesiredResource::pipeline_template(
            "deploy-v2",
            json!({"schema": "v2", "variables": [{"name": "region"}]}),
        )
    }

    #[test]
    fn test_pipeline_template_created_and_awaited() {
        let mock = MockGate::new();
        mock.on_json(
            Method::Post,
            "/v2/pipelineTemplates/create",
            202,
            &json!({"ref": "/tasks/01T"}),
        );
        mock.on_json(Method::Get, "/tasks/01T", 200, &json!({"status": "SUCCEEDED"}));

        let outcome = reconciler(&mock).apply(&deploy_template()).unwrap();

        assert_eq!(outcome, Outcome::Created);
        assert!(mock.calls_to(Method::Post, "/tasks").is_empty());
        let calls = mock.calls_to(Method::Post, "/v2/pipelineTemplates/create");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body.as_ref().unwrap()["id"], "deploy-v2");
        assert_eq!(mock.calls_to(Method::Get, "/tasks/01T").len(), 1);
    }

    #[test]
    fn test_pipeline_template_updated_or_skipped() {
        let mock = MockGate::new();
        mock.on_json(
            Method::Get,
            "/v2/pipelineTemplates/deploy-v2",
            200,
            &json!({"id": "deploy-v2", "schema": "v2", "variables": []}),
        );
        mock.on_json(
            Method::Post,
            "/v2/pipelineTemplates/update/deploy-v2",
            200,
            &json!({"ref": "/tasks/01U"}),
        );
        mock.on_json(Method::Get, "/tasks/01U", 200, &json!({"status": "SUCCEEDED"}));

        let reconciler = reconciler(&mock);
        assert_eq!(
            reconciler.apply(&deploy_template()).unwrap(),
            Outcome::Updated
        );
        assert_eq!(
            mock.calls_to(Method::Post, "/v2/pipelineTemplates/update/deploy-v2").len(),
            1
        );

        let unchanged = DesiredResource::pipeline_template("deploy-v2", json!({"schema": "v2"}));
        assert_eq!(
            reconciler.plan(&unchanged).unwrap(),
            Action::Skip(SkipReason::UpToDate)
        );
    }

    #[test]
    fn test_pipeline_template_destroy() {
        let mock = MockGate::new();
        mock.on_json(
            Method::Get,
            "/v2/pipelineTemplates/deploy-v2",
            200,
            &json!({"schema": "v2"}),
        );
        mock.on_json(
            Method::Delete,
            "/v2/pipelineTemplates/deploy-v2",
            202,
            &json!({"ref": "/tasks/01D"}),
        );
        mock.on_json(Method::Get, "/tasks/01D", 200, &json!({"status": "SUCCEEDED"}));

        let reconciler = reconciler(&mock);
        assert_eq!(
            reconciler.destroy(&deploy_template()).unwrap(),
            Outcome::Deleted
        );

        let absent = DesiredResource::pipeline_template("gone", json!({}));
        assert_eq!(reconciler.destroy(&absent).unwrap(), Outcome::AlreadyAbsent);
        assert_eq!(mock.mutation_count(), 1);
    }

    #[test]
    fn test_read_returns_document_or_not_found() {
        let mock = MockGate::new();
        mock.on_json(Method::Get, "/projects/platform", 200, &json!({"id": "42"}));

        let reconciler = reconciler(&mock);
        let doc = reconciler
            .read(ResourceKind::Project, "", "platform")
            .unwrap();
        assert_eq!(doc["id"], "42");

        let err = reconciler
            .read(ResourceKind::Pipeline, "demo", "missing")
            .unwrap_err();
        assert!(err.is_ignorable());
    }

    #[test]
    fn test_prepare_without_gate() {
        let validator = Validator::new(&ConstraintSet::builtin()).unwrap();

        let prepared = prepare(&validator, &demo_app()).unwrap();
        assert!(matches!(prepared, Prepared::Application(_)));

        let bad = DesiredResource::pipeline("demo", "deploy", json!(["not", "an", "object"]));
        assert!(prepare(&validator, &bad).is_err());
    }
}
