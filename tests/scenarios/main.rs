//! Scenario-based tests for containerize

#[path = "../helpers.rs"]
mod helpers;

mod build_retry;
mod configuration;
mod dockerfile_failure;
mod fix_failure;
mod iteration_budget;
mod partial_convergence;
mod success_first_try;
