//! Execution: reconcile resources wave by wave on a thread pool

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use gatekit::Gate;
use rayon::prelude::*;
use reconcile::{CancelToken, DesiredResource, Outcome, Reconciler, ResourceKind};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::progress;

use super::planner::{Mode, waves};

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Converge or remove
    pub mode: Mode,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Cancel outstanding work after the first failure
    pub fail_fast: bool,
    /// Hide the progress bar
    pub quiet: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Apply,
            jobs: 4,
            fail_fast: false,
            quiet: false,
        }
    }
}

/// Result of reconciling one resource
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyResult {
    Done(Outcome),
    Failed { error: String, advice: &'static str },
    Skipped { reason: String },
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub no_change: usize,
    pub already_absent: usize,
    pub skipped: usize,
    pub failed: usize,
    /// `(resource key, error, advice)` per failure
    pub failures: Vec<(String, String, &'static str)>,
    /// `(resource key, reason)` per skipped resource
    pub skips: Vec<(String, String)>,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    fn record(&mut self, key: String, result: ApplyResult) {
        match result {
            ApplyResult::Done(Outcome::Created) => self.created += 1,
            ApplyResult::Done(Outcome::Updated) => self.updated += 1,
            ApplyResult::Done(Outcome::Deleted) => self.deleted += 1,
            ApplyResult::Done(Outcome::NoChange) => self.no_change += 1,
            ApplyResult::Done(Outcome::AlreadyAbsent) => self.already_absent += 1,
            ApplyResult::Skipped { reason } => {
                self.skipped += 1;
                self.skips.push((key, reason));
            }
            ApplyResult::Failed { error, advice } => {
                self.failed += 1;
                self.failures.push((key, error, advice));
            }
        }
    }
}

type SharedResults = Arc<Mutex<Vec<(String, ApplyResult)>>>;

/// Reconcile every resource.
///
/// Resources run in dependency waves. During apply, pipelines whose
/// application failed are skipped. With `fail_fast`, the first failure
/// cancels `cancel` and everything not yet started is skipped.
pub fn execute<G: Gate>(
    reconciler: &Reconciler<G>,
    resources: &[DesiredResource],
    opts: &ExecuteOptions,
    cancel: &CancelToken,
) -> Result<ExecuteSummary> {
    let mut summary = ExecuteSummary::default();
    let mut failed_apps: HashSet<String> = HashSet::new();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    let label = match opts.mode {
        Mode::Apply => "Applying",
        Mode::Destroy => "Destroying",
    };
    let pb = progress::bar(resources.len() as u64, label, opts.quiet);

    for wave in waves(resources, opts.mode) {
        let results: SharedResults = Arc::new(Mutex::new(Vec::new()));

        pool.install(|| {
            wave.par_iter().for_each(|resource| {
                let result = run_one(reconciler, resource, opts, cancel, &failed_apps);

                let symbol = match &result {
                    ApplyResult::Done(outcome) if outcome.is_change() => "✓",
                    ApplyResult::Done(_) => "○",
                    ApplyResult::Failed { .. } => "✗",
                    ApplyResult::Skipped { .. } => "⊘",
                };
                pb.set_message(format!("{} {}", symbol, resource.key()));
                pb.inc(1);

                push_apply_result(&results, resource.key(), result);
            });
        });

        for (key, result) in into_apply_results(results)? {
            if matches!(result, ApplyResult::Failed { .. })
                && let Some(app) = key.strip_prefix("application:")
            {
                failed_apps.insert(app.to_string());
            }
            summary.record(key, result);
        }
    }

    pb.finish_and_clear();
    Ok(summary)
}

fn run_one<G: Gate>(
    reconciler: &Reconciler<G>,
    resource: &DesiredResource,
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    failed_apps: &HashSet<String>,
) -> ApplyResult {
    if cancel.is_cancelled() {
        return ApplyResult::Skipped {
            reason: "cancelled after an earlier failure".to_string(),
        };
    }

    if opts.mode == Mode::Apply
        && resource.kind() == ResourceKind::Pipeline
        && failed_apps.contains(resource.owner())
    {
        return ApplyResult::Skipped {
            reason: format!("application {} failed", resource.owner()),
        };
    }

    let result = match opts.mode {
        Mode::Apply => reconciler.apply(resource),
        Mode::Destroy => reconciler.destroy(resource),
    };

    match result {
        Ok(outcome) => {
            log::info!("{}: {:?}", resource.key(), outcome);
            ApplyResult::Done(outcome)
        }
        Err(e) => {
            log::warn!("{}: {}", resource.key(), e);
            if opts.fail_fast {
                cancel.cancel();
            }
            ApplyResult::Failed {
                error: e.to_string(),
                advice: e.category().advice(),
            }
        }
    }
}

fn push_apply_result(results: &SharedResults, key: String, result: ApplyResult) {
    match results.lock() {
        Ok(mut locked) => locked.push((key, result)),
        Err(poisoned) => poisoned.into_inner().push((key, result)),
    }
}

fn into_apply_results(results: SharedResults) -> Result<Vec<(String, ApplyResult)>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect apply results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() && summary.total_changes() == 0 {
        println!("  {} Everything up to date", "✓".green().bold());
    } else if summary.is_success() {
        println!("  {} Reconciliation complete", "✓".green().bold());
    } else {
        println!(
            "  {} Reconciliation finished with errors",
            "⚠".yellow().bold()
        );
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.no_change > 0 {
        println!("    • {} resources unchanged", summary.no_change);
    }
    if summary.already_absent > 0 {
        println!("    • {} resources already absent", summary.already_absent);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
        for (key, reason) in &summary.skips {
            println!("      {} {}: {}", "⊘".dimmed(), key, reason.dimmed());
        }
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
        for (key, error, advice) in &summary.failures {
            println!("      {} {}: {}", "✗".red(), key, error);
            println!("        {}", advice.dimmed());
        }
    }
}
