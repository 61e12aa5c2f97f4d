//! Test: Artifact Capture - failure-only upload of the test output directory

use crate::helpers::*;
use matrix_pipeline::execution::ExecutionEvent;

/// Capture runs exactly once per failed job, whichever step failed
#[tokio::test]
async fn test_capture_once_per_failed_job() {
    let runner = MockCommandRunner::new()
        .fail_step_when("lint", "MATRIX_OS", "A", 1)
        .fail_step_when("test", "MATRIX_OS", "C", 1);
    let result = run_workflow_with_mock(CI_WORKFLOW, runner).await;

    assert_run_failed(&result);
    assert_eq!(result.report.failed_jobs().count(), 4, "{}", result.summary());
    assert_eq!(result.artifacts.len(), 4);

    let mut jobs: Vec<&str> = result.artifacts.iter().map(|a| a.job.as_str()).collect();
    jobs.sort();
    jobs.dedup();
    assert_eq!(jobs.len(), 4, "each failed job captures once");

    for request in &result.artifacts {
        assert_eq!(request.name, "test_outputs");
        assert!(request.source.ends_with("tests/apitests_output"));
    }

    let ok = result.job("Tests (B, Z)");
    assert!(ok.artifacts.is_empty());
    assert_step_skipped(&result, "Tests (B, Z)", "capture");
}

/// The capture reports where the artifact went
#[tokio::test]
async fn test_capture_receipt_on_job_report() {
    let runner = MockCommandRunner::new().fail_step_when("test", "MATRIX_OS", "B", 1);
    let result = run_workflow_with_mock(CI_WORKFLOW, runner).await;

    let job = result.job("Tests (B, Z)");
    assert_eq!(job.artifacts.len(), 1);
    assert_eq!(job.artifacts[0].name, "test_outputs");
    assert!(job.artifacts[0].location.contains("job-3-B-Z"), "{}", job.artifacts[0].location);

    let captured = result
        .events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::ArtifactCaptured { .. }))
        .count();
    assert_eq!(captured, 1);
}

/// The capture path is rendered per job
#[tokio::test]
async fn test_capture_path_uses_matrix_values() {
    let yaml = r#"
name: "Reports"
strategy:
  matrix:
    os: [linux, mac]
steps:
  - id: test
    run: pytest
  - id: capture
    if: failure()
    uses: upload-artifact
    with:
      name: report-${{ matrix.os }}
      path: out/${{ matrix.os }}
"#;
    let result = run_workflow_with_mock(yaml, MockCommandRunner::new().fail_step("test", 1)).await;

    let mut names: Vec<&str> = result.artifacts.iter().map(|a| a.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["report-linux", "report-mac"]);
    assert!(result.artifacts.iter().any(|a| a.source.ends_with("out/mac")));
}
