// Manifest commands: apply, plan, destroy
pub mod apply;

// Data source lookup
pub mod get;

// Local checks
pub mod validate;

use anyhow::{Context as AnyhowContext, Result};
use gatekit::HttpGate;
use reconcile::{CancelToken, ConflictPolicy, ConstraintSet, Reconciler, Validator};

use crate::Context;

/// Validator with the built-in provider rules
pub fn builtin_validator() -> Result<Validator> {
    Validator::new(&ConstraintSet::builtin()).context("Invalid built-in name constraints")
}

/// Build a reconciler against the configured Gate.
///
/// The returned token is shared with the reconciler's task waits.
pub fn connect(ctx: &Context, policy: ConflictPolicy) -> Result<(Reconciler<HttpGate>, CancelToken)> {
    let settings = ctx.settings()?;
    let gate_config = settings.gate_config()?;
    log::debug!("Using Gate at {}", gate_config.endpoint);

    let gate = HttpGate::new(gate_config).context("Failed to create Gate client")?;
    let cancel = CancelToken::new();
    let reconciler = Reconciler::new(gate, builtin_validator()?)
        .with_wait_config(settings.wait_config())
        .with_policy(policy)
        .with_cancel_token(cancel.clone());

    Ok((reconciler, cancel))
}
