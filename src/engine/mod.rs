//! Execution engine for spingate
//!
//! The engine orchestrates:
//! 1. Planning - Probe each resource and decide its action
//! 2. Diffing - Show the planned actions
//! 3. Executing - Reconcile in dependency waves with parallelism

pub mod differ;
pub mod executor;
pub mod planner;

pub use differ::display_plan;
pub use executor::{ExecuteOptions, execute, print_summary};
pub use planner::{Mode, PlannedChange, plan};
