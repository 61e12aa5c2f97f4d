//! Test: Triggers - push and pull request events against branch filters

use crate::helpers::*;
use matrix_pipeline::core::config::WorkflowConfig;
use matrix_pipeline::{JobOutcome, SchedulingStrategy, TriggerEvent};

/// Push and pull request to master both start the workflow; other branches don't
#[test]
fn test_branch_filters() {
    let workflow = WorkflowConfig::from_yaml(CI_WORKFLOW).unwrap().to_workflow().unwrap();

    assert!(workflow.is_triggered_by(&TriggerEvent::push("master")));
    assert!(workflow.is_triggered_by(&TriggerEvent::pull_request("master")));
    assert!(!workflow.is_triggered_by(&TriggerEvent::push("feature/x")));
    assert!(!workflow.is_triggered_by(&TriggerEvent::pull_request("develop")));
}

/// Glob patterns match release branches
#[test]
fn test_glob_branches() {
    let yaml = r#"
name: "Release"
on:
  push:
    branches: ["release/*", "hotfix/**"]
steps:
  - run: make
"#;
    let workflow = WorkflowConfig::from_yaml(yaml).unwrap().to_workflow().unwrap();

    assert!(workflow.is_triggered_by(&TriggerEvent::push("release/1.2")));
    assert!(!workflow.is_triggered_by(&TriggerEvent::push("release/1.2/rc")));
    assert!(workflow.is_triggered_by(&TriggerEvent::push("hotfix/a/b")));
    assert!(!workflow.is_triggered_by(&TriggerEvent::pull_request("release/1.2")));
}

/// The triggering event is carried through to the run report
#[tokio::test]
async fn test_event_recorded_on_report() {
    let event = TriggerEvent::pull_request("master");
    let result = run_workflow_with_options(
        CI_WORKFLOW,
        MockCommandRunner::new(),
        SchedulingStrategy::LimitedParallel(2),
        Some(event.clone()),
    )
    .await;

    assert_run_succeeded(&result);
    assert_eq!(result.report.event, Some(event));
}

/// Each triggered run is independent and gets its own run id
#[tokio::test]
async fn test_each_trigger_is_a_full_run() {
    let first = run_workflow_with_mock(CI_WORKFLOW, MockCommandRunner::new()).await;
    let second = run_workflow_with_mock(CI_WORKFLOW, MockCommandRunner::new()).await;

    assert_ne!(first.report.run_id, second.report.run_id);
    assert_eq!(first.report.jobs.len(), second.report.jobs.len());
}

fn job_results(result: &WorkflowTestResult) -> Vec<(String, JobOutcome, Vec<String>)> {
    result
        .report
        .jobs
        .iter()
        .map(|job| (job.name.clone(), job.outcome, result.executed_steps(&job.name)))
        .collect()
}

/// Re-running the same workflow against the same commands gives the same jobs
#[tokio::test]
async fn test_rerun_reproduces_job_results() {
    let scripted = || {
        MockCommandRunner::new()
            .fail_step_when("lint", "MATRIX_OS", "A", 1)
            .fail_step_when("test", "MATRIX_OS", "C", 2)
    };
    let event = TriggerEvent::push("master");

    let first = run_workflow_with_options(CI_WORKFLOW, scripted(), SchedulingStrategy::Parallel, Some(event.clone())).await;
    let second = run_workflow_with_options(CI_WORKFLOW, scripted(), SchedulingStrategy::Parallel, Some(event)).await;

    assert_run_failed(&first);
    assert_eq!(first.report.status, second.report.status);
    assert_eq!(job_results(&first), job_results(&second));
    assert_eq!(first.report.failed_jobs().count(), 4);
}
