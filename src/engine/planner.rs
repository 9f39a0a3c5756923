//! Planning: probe every resource and decide its action without submitting

use anyhow::{Context, Result};
use gatekit::Gate;
use rayon::prelude::*;
use reconcile::{Action, DesiredResource, Reconciler, ResourceKind};

/// Whether resources are being converged or removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Apply,
    Destroy,
}

/// Decided action for one resource
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub key: String,
    pub kind: ResourceKind,
    pub action: std::result::Result<Action, String>,
}

impl PlannedChange {
    pub fn is_mutation(&self) -> bool {
        self.action.as_ref().is_ok_and(Action::is_mutation)
    }

    pub fn is_error(&self) -> bool {
        self.action.is_err()
    }
}

/// Plan every resource in parallel. Order of the input is kept.
pub fn plan<G: Gate>(
    reconciler: &Reconciler<G>,
    resources: &[DesiredResource],
    mode: Mode,
    jobs: usize,
) -> Result<Vec<PlannedChange>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create plan thread pool")?;

    let changes: Vec<PlannedChange> = pool.install(|| {
        resources
            .par_iter()
            .map(|resource| {
                let action = match mode {
                    Mode::Apply => reconciler.plan(resource),
                    Mode::Destroy => reconciler.plan_destroy(resource),
                };
                PlannedChange {
                    key: resource.key(),
                    kind: resource.kind(),
                    action: action.map_err(|e| e.to_string()),
                }
            })
            .collect()
    });

    Ok(changes)
}

/// Split resources into dependency waves.
///
/// Apply creates applications before the resources that reference them;
/// destroy runs the waves in reverse.
pub fn waves(resources: &[DesiredResource], mode: Mode) -> Vec<Vec<&DesiredResource>> {
    let mut kinds: Vec<ResourceKind> = ResourceKind::all().to_vec();
    if mode == Mode::Destroy {
        kinds.reverse();
    }

    kinds
        .into_iter()
        .map(|kind| {
            resources
                .iter()
                .filter(|resource| resource.kind() == kind)
                .collect::<Vec<_>>()
        })
        .filter(|wave| !wave.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekit::{Method, MockGate};
    use reconcile::{ApplicationSpec, ConstraintSet, ProjectSpec, Validator};
    use serde_json::json;

    fn resources() -> Vec<DesiredResource> {
        vec![
            DesiredResource::application(
                "demo",
                ApplicationSpec {
                    email: "team@example.com".into(),
                    ..ApplicationSpec::default()
                },
            ),
            DesiredResource::project("platform", ProjectSpec::default()),
            DesiredResource::pipeline("demo", "deploy", json!({"stages": []})),
        ]
    }

    #[test]
    fn test_waves_follow_dependency_order() {
        let resources = resources();

        let apply: Vec<Vec<String>> = waves(&resources, Mode::Apply)
            .iter()
            .map(|wave| wave.iter().map(|r| r.key()).collect())
            .collect();
        assert_eq!(
            apply,
            vec![
                vec!["application:demo".to_string()],
                vec!["project:platform".to_string()],
                vec!["pipeline:demo/deploy".to_string()],
            ]
        );

        let destroy = waves(&resources, Mode::Destroy);
        assert_eq!(destroy[0][0].kind(), ResourceKind::Pipeline);
        assert_eq!(destroy[2][0].kind(), ResourceKind::Application);
    }

    #[test]
    fn test_templates_precede_pipelines() {
        let resources = vec![
            DesiredResource::pipeline(
                "demo",
                "deploy",
                json!({"template": {"source": "spinnaker://deploy-v2"}}),
            ),
            DesiredResource::pipeline_template("deploy-v2", json!({"schema": "v2"})),
        ];

        let apply = waves(&resources, Mode::Apply);
        assert_eq!(apply[0][0].kind(), ResourceKind::PipelineTemplate);
        assert_eq!(apply[1][0].kind(), ResourceKind::Pipeline);

        let destroy = waves(&resources, Mode::Destroy);
        assert_eq!(destroy[0][0].kind(), ResourceKind::Pipeline);
        assert_eq!(destroy[1][0].kind(), ResourceKind::PipelineTemplate);
    }

    #[test]
    fn test_plan_keeps_order_and_records_errors() {
        let mock = MockGate::new();
        mock.on_json(
            Method::Get,
            "/applications/demo",
            200,
            &json!({
                "name": "demo",
                "attributes": {"name": "demo", "email": "team@example.com", "instancePort": 80}
            }),
        );
        mock.fail(Method::Get, "/projects/platform", "connection refused");

        let validator = Validator::new(&ConstraintSet::builtin()).unwrap();
        let reconciler = Reconciler::new(mock.clone(), validator);

        let changes = plan(&reconciler, &resources(), Mode::Apply, 2).unwrap();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].key, "application:demo");
        assert!(!changes[0].is_mutation());
        assert!(changes[1].is_error());
        assert_eq!(changes[2].action, Ok(Action::Create));
        assert_eq!(mock.mutation_count(), 0);
    }
}
