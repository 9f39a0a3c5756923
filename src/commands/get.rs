//! `get` - print the remote document of one resource

use anyhow::{Context as AnyhowContext, Result};
use reconcile::{ConflictPolicy, ResourceKind};

use crate::Context;
use crate::cli::GetArgs;
use crate::progress;

pub fn run(ctx: &Context, args: GetArgs) -> Result<()> {
    let kind = ResourceKind::from(args.kind);
    let application = args.application.as_deref().unwrap_or_default();
    let (reconciler, _) = super::connect(ctx, ConflictPolicy::UpdateExisting)?;

    let spinner = progress::spinner(&format!("Reading {kind} {}", args.name), ctx.quiet);
    let document = reconciler.read(kind, application, &args.name);
    spinner.finish_and_clear();

    let document = document.with_context(|| format!("Could not read {kind} {}", args.name))?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
