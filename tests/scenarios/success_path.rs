//! Test: Success Path - every step passes in every job

use crate::helpers::*;
use matrix_pipeline::execution::ExecutionEvent;
use matrix_pipeline::SchedulingStrategy;

/// All steps exit zero: every job succeeds and nothing is captured
#[tokio::test]
async fn test_all_jobs_succeed() {
    let result = run_workflow_with_mock(CI_WORKFLOW, MockCommandRunner::new()).await;

    assert_run_succeeded(&result);
    assert_eq!(result.report.jobs.len(), 5);

    for job in &result.report.jobs {
        assert_job_succeeded(&result, &job.name);
        assert_executed_steps(
            &result,
            &job.name,
            &["checkout", "provision", "install", "lint", "test"],
        );
        assert_step_skipped(&result, &job.name, "capture");
    }

    assert!(result.artifacts.is_empty(), "No artifact on success: {}", result.summary());
}

/// Steps run in declaration order within a job
#[tokio::test]
async fn test_steps_run_in_order() {
    let result = run_workflow_with_options(
        CI_WORKFLOW,
        MockCommandRunner::new(),
        SchedulingStrategy::Sequential,
        None,
    )
    .await;
    assert_run_succeeded(&result);

    let commands: Vec<&str> = result
        .invocations_for("MATRIX_OS", "B")
        .iter()
        .map(|inv| inv.step_id.as_str())
        .collect();
    assert_eq!(commands, vec!["provision", "install", "lint", "test"]);
}

/// Matrix values reach the commands through rendering and the environment
#[tokio::test]
async fn test_matrix_values_in_environment() {
    let result = run_workflow_with_mock(CI_WORKFLOW, MockCommandRunner::new()).await;

    let probes: Vec<&str> = result
        .invocations
        .iter()
        .filter(|inv| inv.step_id == "provision")
        .map(|inv| inv.script.as_str())
        .collect();
    assert_eq!(probes.len(), 5);
    assert!(probes.contains(&"pythonZ --version"));

    let job = result.invocations_for("MATRIX_OS", "C");
    let test = job.iter().find(|inv| inv.step_id == "test").unwrap();
    assert_eq!(test.env.get("MATRIX_RUNTIME_VERSION").map(String::as_str), Some("Z"));
    assert_eq!(test.env.get("RUNTIME").map(String::as_str), Some("pythonZ"));
    assert_eq!(test.env.get("JOB_NAME").map(String::as_str), Some("Tests (C, Z)"));
}

/// Jobs get distinct workspaces and checkout populates them
#[tokio::test]
async fn test_each_job_has_its_own_workspace() {
    let result = run_workflow_with_mock(CI_WORKFLOW, MockCommandRunner::new()).await;

    let mut dirs: Vec<_> = result
        .invocations
        .iter()
        .filter(|inv| inv.step_id == "test")
        .map(|inv| inv.working_dir.clone())
        .collect();
    dirs.sort();
    dirs.dedup();
    assert_eq!(dirs.len(), 5);

    let job = result.job("Tests (A, X)");
    let checkout = job.steps.get("checkout").unwrap();
    assert!(checkout.output.contains("Checked out 1 files"), "{}", checkout.output);
}

/// Run and job lifecycle events are emitted
#[tokio::test]
async fn test_lifecycle_events() {
    let result = run_workflow_with_mock(CI_WORKFLOW, MockCommandRunner::new()).await;

    let started = result
        .events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::JobStarted { .. }))
        .count();
    let completed = result
        .events
        .iter()
        .filter(|e| matches!(e, ExecutionEvent::JobCompleted { .. }))
        .count();
    assert_eq!(started, 5);
    assert_eq!(completed, 5);

    assert!(matches!(
        result.events.first(),
        Some(ExecutionEvent::RunStarted { total_jobs: 5, .. })
    ));
    assert!(matches!(result.events.last(), Some(ExecutionEvent::RunCompleted { .. })));
}
