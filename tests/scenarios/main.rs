//! Scenario-based tests for matrix-pipeline

#[path = "../helpers.rs"]
mod helpers;

mod artifact_capture;
mod failure_handling;
mod matrix_expansion;
mod success_path;
mod triggers;
