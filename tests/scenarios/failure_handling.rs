//! Test: Failure Handling - short-circuit, isolation between jobs, failure-only steps

use crate::helpers::*;
use matrix_pipeline::core::StepState;

/// A failing lint stops the default steps that follow it
#[tokio::test]
async fn test_lint_failure_short_circuits_test() {
    let runner = MockCommandRunner::new().fail_step("lint", 1);
    let result = run_workflow_with_mock(CI_WORKFLOW, runner).await;

    assert_run_failed(&result);
    for job in &result.report.jobs {
        assert_job_failed_at(&result, &job.name, "lint");
        assert_step_skipped(&result, &job.name, "test");
        assert_executed_steps(
            &result,
            &job.name,
            &["checkout", "provision", "install", "lint", "capture"],
        );
    }

    assert!(
        result.invocations.iter().all(|inv| inv.step_id != "test"),
        "test must never be invoked after lint fails"
    );
}

/// A failure in one job leaves its siblings untouched
#[tokio::test]
async fn test_failure_is_isolated_to_its_job() {
    let runner = MockCommandRunner::new().fail_step_when("test", "MATRIX_OS", "B", 2);
    let result = run_workflow_with_mock(CI_WORKFLOW, runner).await;

    assert_run_failed(&result);
    assert_eq!(result.report.failed_jobs().count(), 1, "{}", result.summary());

    assert_job_failed_at(&result, "Tests (B, Z)", "test");
    assert_eq!(result.step_state("Tests (B, Z)", "test").exit_code(), Some(2));

    for name in ["Tests (A, X)", "Tests (A, Y)", "Tests (A, Z)", "Tests (C, Z)"] {
        assert_job_succeeded(&result, name);
        assert_step_skipped(&result, name, "capture");
    }
}

/// A failing provisioning step keeps install, lint and test from running
#[tokio::test]
async fn test_provision_failure() {
    let runner = MockCommandRunner::new().fail_step_when("provision", "MATRIX_RUNTIME_VERSION", "Y", 127);
    let result = run_workflow_with_mock(CI_WORKFLOW, runner).await;

    assert_run_failed(&result);
    assert_job_failed_at(&result, "Tests (A, Y)", "provision");
    assert_executed_steps(&result, "Tests (A, Y)", &["checkout", "provision", "capture"]);

    match result.step_state("Tests (A, Y)", "provision") {
        StepState::Failed { error, .. } => assert!(error.contains("pythonY"), "{}", error),
        other => panic!("provision should have failed, was {:?}", other),
    }
}

/// A command that cannot start fails the step without an exit code
#[tokio::test]
async fn test_spawn_error_fails_step() {
    let yaml = r#"
name: "Spawn"
steps:
  - id: build
    run: make
  - id: after
    run: echo after
"#;
    let result = run_workflow_with_mock(yaml, MockCommandRunner::new().spawn_error("build")).await;

    assert_run_failed(&result);
    assert_job_failed_at(&result, "Spawn", "build");
    assert_eq!(result.step_state("Spawn", "build").exit_code(), None);
    assert_step_skipped(&result, "Spawn", "after");
}

/// `always()` steps run on both outcomes without deciding either
#[tokio::test]
async fn test_always_condition() {
    let yaml = r#"
name: "Always"
strategy:
  matrix:
    os: [A, B]
steps:
  - id: test
    run: pytest
  - id: report
    if: always()
    run: ./report.sh
"#;
    let runner = MockCommandRunner::new()
        .fail_step_when("test", "MATRIX_OS", "A", 1)
        .fail_step_when("report", "MATRIX_OS", "B", 1);
    let result = run_workflow_with_mock(yaml, runner).await;

    assert_executed_steps(&result, "Always (A)", &["test", "report"]);
    assert_job_failed_at(&result, "Always (A)", "test");

    assert_executed_steps(&result, "Always (B)", &["test", "report"]);
    assert_job_succeeded(&result, "Always (B)");
    assert!(result.step_state("Always (B)", "report").is_failed());
}

/// A failing `always()` step on a green job neither fails it nor triggers capture
#[tokio::test]
async fn test_failing_always_step_keeps_job_green() {
    let yaml = r#"
name: "Green"
steps:
  - id: test
    run: pytest
  - id: report
    if: always()
    run: ./report.sh
  - id: publish
    run: ./publish.sh
  - id: capture
    if: failure()
    uses: upload-artifact
    with:
      name: outputs
      path: out
"#;
    let result = run_workflow_with_mock(yaml, MockCommandRunner::new().fail_step("report", 1)).await;

    assert_run_succeeded(&result);
    assert_job_succeeded(&result, "Green");
    assert_executed_steps(&result, "Green", &["test", "report", "publish"]);
    assert_step_skipped(&result, "Green", "capture");
    assert!(result.artifacts.is_empty());
}

/// A failing failure-handler does not bring back skipped default steps
#[tokio::test]
async fn test_failing_failure_step() {
    let yaml = r#"
name: "Handlers"
steps:
  - id: test
    run: pytest
  - id: notify
    if: failure()
    run: ./notify.sh
  - id: cleanup
    if: ${{ failure() }}
    run: ./cleanup.sh
  - id: publish
    run: ./publish.sh
"#;
    let runner = MockCommandRunner::new().fail_step("test", 1).fail_step("notify", 3);
    let result = run_workflow_with_mock(yaml, runner).await;

    assert_executed_steps(&result, "Handlers", &["test", "notify", "cleanup"]);
    assert_step_skipped(&result, "Handlers", "publish");
    assert_job_failed_at(&result, "Handlers", "test");
}
