//! Plan display

use colored::{ColoredString, Colorize};
use reconcile::{Action, ResourceKind};

use super::planner::PlannedChange;

fn kind_heading(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Application => "Applications",
        ResourceKind::Project => "Projects",
        ResourceKind::PipelineTemplate => "Pipeline templates",
        ResourceKind::Pipeline => "Pipelines",
        ResourceKind::CanaryConfig => "Canary configs",
    }
}

fn symbol(change: &PlannedChange) -> ColoredString {
    match &change.action {
        Ok(Action::Create) => "+".green(),
        Ok(Action::Update { .. }) => "~".yellow(),
        Ok(Action::Delete { .. }) => "-".red(),
        Ok(Action::Skip(_) | Action::AlreadyAbsent) => "○".dimmed(),
        Err(_) => "✗".red(),
    }
}

fn describe(change: &PlannedChange) -> String {
    match &change.action {
        Ok(Action::Create) => "(will create)".to_string(),
        Ok(Action::Update { id }) => format!("(will update {id})"),
        Ok(Action::Delete { id }) => format!("(will delete {id})"),
        Ok(Action::Skip(reason)) => format!("({reason})"),
        Ok(Action::AlreadyAbsent) => "(already absent)".to_string(),
        Err(error) => error.clone(),
    }
}

/// Display planned changes grouped by kind
pub fn display_plan(changes: &[PlannedChange]) {
    if changes.is_empty() {
        println!();
        println!("  {} Manifest is empty", "ℹ".blue());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Reconciliation Plan".bold()
    );
    println!("│");

    for kind in ResourceKind::all() {
        let of_kind: Vec<_> = changes.iter().filter(|c| c.kind == *kind).collect();
        if of_kind.is_empty() {
            continue;
        }

        println!("│ {}", kind_heading(*kind).bold());
        for change in of_kind {
            let description = describe(change);
            let description = if change.is_error() {
                description.red()
            } else {
                description.dimmed()
            };
            println!("│   {} {:<36} {}", symbol(change), change.key, description);
        }
        println!("│");
    }

    let mutations = changes.iter().filter(|c| c.is_mutation()).count();
    let errors = changes.iter().filter(|c| c.is_error()).count();

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes, {} unchanged, {} errors",
        mutations.to_string().bold(),
        (changes.len() - mutations - errors).to_string().green(),
        errors.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}
