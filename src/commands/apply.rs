//! Manifest commands
//!
//! - `apply` - Converge every manifest resource
//! - `plan` - Preview what apply would do
//! - `destroy` - Delete every manifest resource

use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::ConflictPolicy;

use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs, PlanArgs};
use crate::engine::{self, ExecuteOptions, Mode};
use crate::manifest;
use crate::ui;

pub fn apply(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let resources = manifest::load(&args.manifest)?;
    let policy = if args.create_only {
        ConflictPolicy::SkipExisting
    } else {
        ConflictPolicy::UpdateExisting
    };
    let (reconciler, cancel) = super::connect(ctx, policy)?;

    if args.dry_run {
        let changes = engine::plan(&reconciler, &resources, Mode::Apply, args.jobs)?;
        engine::display_plan(&changes);
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(());
    }

    if !ctx.quiet {
        ui::header(&format!("Applying {}", args.manifest.display()));
    }

    let opts = ExecuteOptions {
        mode: Mode::Apply,
        jobs: args.jobs,
        fail_fast: args.fail_fast,
        quiet: ctx.quiet,
    };
    let summary = engine::execute(&reconciler, &resources, &opts, &cancel)?;
    engine::print_summary(&summary);

    if !summary.is_success() {
        bail!(
            "{} of {} resources did not reconcile",
            summary.failed + summary.skipped,
            resources.len()
        );
    }
    Ok(())
}

pub fn plan(ctx: &Context, args: PlanArgs) -> Result<()> {
    let resources = manifest::load(&args.manifest)?;
    let (reconciler, _) = super::connect(ctx, ConflictPolicy::UpdateExisting)?;

    let changes = engine::plan(&reconciler, &resources, Mode::Apply, args.jobs)?;
    engine::display_plan(&changes);

    if changes.iter().any(engine::PlannedChange::is_error) {
        bail!("Some resources could not be planned");
    }
    Ok(())
}

pub fn destroy(ctx: &Context, args: DestroyArgs) -> Result<()> {
    let resources = manifest::load(&args.manifest)?;
    let (reconciler, cancel) = super::connect(ctx, ConflictPolicy::UpdateExisting)?;

    let changes = engine::plan(&reconciler, &resources, Mode::Destroy, args.jobs)?;
    engine::display_plan(&changes);

    if !changes.iter().any(engine::PlannedChange::is_mutation) {
        println!();
        println!("  {} Nothing to delete", "✓".green());
        return Ok(());
    }

    if !args.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let opts = ExecuteOptions {
        mode: Mode::Destroy,
        jobs: args.jobs,
        fail_fast: false,
        quiet: ctx.quiet,
    };
    let summary = engine::execute(&reconciler, &resources, &opts, &cancel)?;
    engine::print_summary(&summary);

    if !summary.is_success() {
        bail!("{} resources could not be deleted", summary.failed);
    }
    Ok(())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}
