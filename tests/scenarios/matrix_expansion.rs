//! Test: Matrix Expansion - job counts, exclusions and the no-jobs boundary

use crate::helpers::*;
use matrix_pipeline::core::config::WorkflowConfig;
use matrix_pipeline::RunStatus;

fn expand(yaml: &str) -> Vec<String> {
    let workflow = WorkflowConfig::from_yaml(yaml).unwrap().to_workflow().unwrap();
    workflow
        .expand()
        .iter()
        .map(|job| workflow.job_name(job))
        .collect()
}

/// The 3x3 matrix minus four exclusions leaves five jobs
#[test]
fn test_reference_matrix_expands_to_five() {
    assert_eq!(
        expand(CI_WORKFLOW),
        vec![
            "Tests (A, X)",
            "Tests (A, Y)",
            "Tests (A, Z)",
            "Tests (B, Z)",
            "Tests (C, Z)",
        ]
    );
}

/// Without exclusions the job count is the product of the axis sizes
#[test]
fn test_product_without_exclusions() {
    let yaml = r#"
name: "Grid"
strategy:
  matrix:
    os: [a, b, c]
    version: ["1", "2"]
    arch: [x64, arm64]
steps:
  - run: make
"#;
    assert_eq!(expand(yaml).len(), 12);
}

/// A single axis yields one job per value
#[test]
fn test_single_axis() {
    let yaml = r#"
name: "Versions"
strategy:
  matrix:
    runtime-version: ["3.7", "3.8", "3.9"]
steps:
  - run: pytest
"#;
    assert_eq!(
        expand(yaml),
        vec!["Versions (3.7)", "Versions (3.8)", "Versions (3.9)"]
    );
}

/// A partial exclusion removes every combination it agrees with
#[test]
fn test_partial_exclusion() {
    let yaml = r#"
name: "Partial"
strategy:
  matrix:
    os: [a, b]
    version: ["1", "2", "3"]
    exclude:
      - os: b
steps:
  - run: make
"#;
    assert_eq!(
        expand(yaml),
        vec!["Partial (a, 1)", "Partial (a, 2)", "Partial (a, 3)"]
    );
}

/// Excluding every combination reports no jobs instead of failing
#[tokio::test]
async fn test_all_excluded_reports_no_jobs() {
    let yaml = r#"
name: "Empty"
strategy:
  matrix:
    os: [a, b]
    exclude:
      - os: a
      - os: b
steps:
  - run: make
"#;
    let result = run_workflow_with_mock(yaml, MockCommandRunner::new()).await;

    assert_eq!(result.report.status, RunStatus::NoJobs);
    assert!(result.report.jobs.is_empty());
    assert!(result.invocations.is_empty());
    assert!(result.report.is_success());
}

/// Exclusions must name declared axes and values
#[test]
fn test_invalid_exclusions_are_rejected() {
    let undeclared_value = r#"
name: "Bad"
strategy:
  matrix:
    os: [a, b]
    exclude:
      - os: c
steps:
  - run: make
"#;
    let err = WorkflowConfig::from_yaml(undeclared_value).unwrap_err();
    assert!(format!("{:#}", err).contains("c"), "{:#}", err);

    let undeclared_axis = r#"
name: "Bad"
strategy:
  matrix:
    os: [a, b]
    exclude:
      - arch: x64
steps:
  - run: make
"#;
    assert!(WorkflowConfig::from_yaml(undeclared_axis).is_err());
}

/// max-parallel caps concurrency but never changes the result
#[tokio::test]
async fn test_max_parallel_one_matches_parallel() {
    let capped = CI_WORKFLOW.replace("strategy:\n", "strategy:\n  max-parallel: 1\n");
    let runner = MockCommandRunner::new().fail_step_when("test", "MATRIX_OS", "C", 1);
    let result = run_workflow_with_mock(&capped, runner).await;

    assert_eq!(result.report.jobs.len(), 5);
    assert_eq!(result.report.failed_jobs().count(), 1);
    assert_job_failed_at(&result, "Tests (C, Z)", "test");
}
