//! `validate` - check a manifest without contacting Gate

use anyhow::{Result, bail};
use colored::Colorize;
use reconcile::{DesiredResource, Validator, prepare};

use crate::Context;
use crate::cli::ManifestArgs;
use crate::manifest;
use crate::ui;

pub fn run(ctx: &Context, args: ManifestArgs) -> Result<()> {
    let resources = manifest::load(&args.manifest)?;
    let validator = super::builtin_validator()?;

    let errors = check(&validator, &resources);

    if !ctx.quiet {
        ui::header(&format!("Validating {}", args.manifest.display()));
        for resource in &resources {
            let key = resource.key();
            match errors.iter().find(|(k, _)| *k == key) {
                Some((_, error)) => println!("  {} {:<36} {}", "✗".red(), key, error.red()),
                None => println!("  {} {}", "✓".green(), key),
            }
        }
    }

    if !errors.is_empty() {
        bail!("{} of {} resources are invalid", errors.len(), resources.len());
    }

    if !ctx.quiet {
        println!();
        ui::success(&format!("{} resources are valid", resources.len()));
    }
    Ok(())
}

/// `(resource key, message)` for every resource that fails local validation
fn check(validator: &Validator, resources: &[DesiredResource]) -> Vec<(String, String)> {
    resources
        .iter()
        .filter_map(|resource| {
            prepare(validator, resource)
                .err()
                .map(|e| (resource.key(), e.to_string()))
        })
        .collect()
}
