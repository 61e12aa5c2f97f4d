//! Test utility functions for matrix-pipeline

#![allow(dead_code)]

use matrix_pipeline::core::config::WorkflowConfig;
use matrix_pipeline::core::{JobOutcome, RunStatus, StepState};
use matrix_pipeline::execution::artifacts::{ArtifactRequest, InMemoryArtifactStore};
use matrix_pipeline::execution::runner::{CommandInvocation, CommandOutput, CommandRunner, RunnerError};
use matrix_pipeline::execution::{
    ExecutionEngine, ExecutionEvent, JobReport, RunReport, RunnerSettings, SchedulingStrategy,
};
use matrix_pipeline::TriggerEvent;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// How the mock should answer an invocation
#[derive(Debug, Clone)]
enum Behavior {
    Exit(i32),
    SpawnError,
}

#[derive(Debug, Clone)]
struct Rule {
    step_id: String,
    /// Environment entries that must all match, e.g. `MATRIX_OS=B`
    when: Vec<(String, String)>,
    behavior: Behavior,
}

/// Command runner that succeeds unless a scripted rule says otherwise
#[derive(Default)]
pub struct MockCommandRunner {
    rules: Vec<Rule>,
    invocations: Mutex<Vec<CommandInvocation>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail a step in every job
    pub fn fail_step(mut self, step_id: &str, exit_code: i32) -> Self {
        self.rules.push(Rule {
            step_id: step_id.to_string(),
            when: Vec::new(),
            behavior: Behavior::Exit(exit_code),
        });
        self
    }

    /// Fail a step only in jobs whose environment has `key=value`
    pub fn fail_step_when(mut self, step_id: &str, key: &str, value: &str, exit_code: i32) -> Self {
        self.rules.push(Rule {
            step_id: step_id.to_string(),
            when: vec![(key.to_string(), value.to_string())],
            behavior: Behavior::Exit(exit_code),
        });
        self
    }

    /// Make a step's command impossible to start
    pub fn spawn_error(mut self, step_id: &str) -> Self {
        self.rules.push(Rule {
            step_id: step_id.to_string(),
            when: Vec::new(),
            behavior: Behavior::SpawnError,
        });
        self
    }

    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    fn behavior_for(&self, invocation: &CommandInvocation) -> Behavior {
        self.rules
            .iter()
            .find(|rule| {
                rule.step_id == invocation.step_id
                    && rule
                        .when
                        .iter()
                        .all(|(k, v)| invocation.env.get(k) == Some(v))
            })
            .map(|rule| rule.behavior.clone())
            .unwrap_or(Behavior::Exit(0))
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutput, RunnerError> {
        self.invocations.lock().unwrap().push(invocation.clone());

        match self.behavior_for(invocation) {
            Behavior::Exit(code) => Ok(CommandOutput {
                exit_code: Some(code),
                stdout: format!("ran {}", invocation.script),
                stderr: String::new(),
            }),
            Behavior::SpawnError => Err(RunnerError::Spawn {
                program: "sh".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "mock spawn failure"),
            }),
        }
    }
}

/// Test result from running a workflow
pub struct WorkflowTestResult {
    pub report: RunReport,
    pub artifacts: Vec<ArtifactRequest>,
    pub invocations: Vec<CommandInvocation>,
    pub events: Vec<ExecutionEvent>,
    pub duration_ms: u64,
}

impl WorkflowTestResult {
    pub fn is_success(&self) -> bool {
        self.report.status == RunStatus::Succeeded
    }

    pub fn is_failed(&self) -> bool {
        self.report.status == RunStatus::Failed
    }

    /// Get a job report by display name
    pub fn job(&self, name: &str) -> &JobReport {
        self.report.job(name).unwrap_or_else(|| {
            let names: Vec<&str> = self.report.jobs.iter().map(|j| j.name.as_str()).collect();
            panic!("Job '{}' not found in result, jobs: {:?}", name, names)
        })
    }

    /// Get the state of a step within a job
    pub fn step_state(&self, job: &str, step_id: &str) -> &StepState {
        self.job(job)
            .step_state(step_id)
            .unwrap_or_else(|| panic!("Step '{}' not found in job '{}'", step_id, job))
    }

    /// Steps that actually ran in a job, in order
    pub fn executed_steps(&self, job: &str) -> Vec<String> {
        self.job(job)
            .steps
            .executed_steps()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Commands issued for one job, identified by its MATRIX_* environment
    pub fn invocations_for(&self, key: &str, value: &str) -> Vec<&CommandInvocation> {
        self.invocations
            .iter()
            .filter(|inv| inv.env.get(key).map(String::as_str) == Some(value))
            .collect()
    }

    /// Get a summary of the result
    pub fn summary(&self) -> String {
        let status = match self.report.status {
            RunStatus::Succeeded => "✅ Succeeded",
            RunStatus::Failed => "❌ Failed",
            RunStatus::NoJobs => "⚠️ No jobs",
            _ => "❓ Unknown",
        };
        format!(
            "{} - {} jobs, {} failed, {} artifacts, {}ms",
            status,
            self.report.jobs.len(),
            self.report.failed_jobs().count(),
            self.artifacts.len(),
            self.duration_ms
        )
    }
}

/// Parse a workflow and run it against a mock runner and in-memory artifact store
pub async fn run_workflow_with_mock(yaml: &str, runner: MockCommandRunner) -> WorkflowTestResult {
    run_workflow_with_options(yaml, runner, SchedulingStrategy::Parallel, None).await
}

pub async fn run_workflow_with_options(
    yaml: &str,
    runner: MockCommandRunner,
    strategy: SchedulingStrategy,
    event: Option<TriggerEvent>,
) -> WorkflowTestResult {
    let workflow = WorkflowConfig::from_yaml(yaml)
        .and_then(|c| c.to_workflow())
        .unwrap_or_else(|e| panic!("Workflow should be valid: {:#}", e));

    let source = tempfile::tempdir().unwrap();
    std::fs::write(source.path().join("setup.py"), b"").unwrap();
    let work = tempfile::tempdir().unwrap();

    let settings = RunnerSettings {
        source_dir: source.path().to_path_buf(),
        work_root: work.path().join("work"),
        artifacts_root: work.path().join("artifacts"),
        keep_workspaces: false,
    };

    let runner = Arc::new(runner);
    let artifacts = Arc::new(InMemoryArtifactStore::new());
    let events = Arc::new(Mutex::new(Vec::new()));

    let mut engine = ExecutionEngine::new(runner.clone(), artifacts.clone(), settings, strategy);
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let start = std::time::Instant::now();
    let report = engine.execute(&workflow, event).await;
    let duration = start.elapsed();

    let events = events.lock().unwrap().clone();
    WorkflowTestResult {
        report,
        artifacts: artifacts.captured().await,
        invocations: runner.invocations(),
        events,
        duration_ms: duration.as_millis() as u64,
    }
}

/// Assert the run succeeded
pub fn assert_run_succeeded(result: &WorkflowTestResult) {
    assert!(
        result.is_success(),
        "Run should have succeeded, but: {}",
        result.summary()
    );
}

/// Assert the run failed
pub fn assert_run_failed(result: &WorkflowTestResult) {
    assert!(
        result.is_failed(),
        "Run should have failed, but: {}",
        result.summary()
    );
}

/// Assert a job succeeded
pub fn assert_job_succeeded(result: &WorkflowTestResult, job: &str) {
    let report = result.job(job);
    assert_eq!(
        report.outcome,
        JobOutcome::Success,
        "Job '{}' should have succeeded, steps: {:?}",
        job,
        report.steps
    );
}

/// Assert a job failed and that the given step was the first failure
pub fn assert_job_failed_at(result: &WorkflowTestResult, job: &str, step_id: &str) {
    let report = result.job(job);
    assert_eq!(report.outcome, JobOutcome::Failed, "Job '{}' should have failed", job);

    let first = report
        .steps
        .first_failure()
        .unwrap_or_else(|| panic!("Job '{}' has no failed step", job));
    assert_eq!(first.step_id, step_id, "Job '{}' failed at the wrong step", job);
}

/// Assert a step was skipped
pub fn assert_step_skipped(result: &WorkflowTestResult, job: &str, step_id: &str) {
    let state = result.step_state(job, step_id);
    assert!(
        matches!(state, StepState::Skipped { .. }),
        "Step '{}' in '{}' should have been skipped, but was in state: {:?}",
        step_id,
        job,
        state
    );
}

/// Assert the exact sequence of steps that ran in a job
pub fn assert_executed_steps(result: &WorkflowTestResult, job: &str, expected: &[&str]) {
    let executed = result.executed_steps(job);
    assert_eq!(
        executed, expected,
        "Job '{}' executed steps {:?}, expected {:?}",
        job, executed, expected
    );
}

/// The 3x3 matrix with four exclusions, one job per surviving (os, version) pair
pub const CI_WORKFLOW: &str = r#"
name: "Tests"
on:
  push:
    branches: [master]
  pull_request:
    branches: [master]
strategy:
  matrix:
    os: [A, B, C]
    runtime-version: [X, Y, Z]
    exclude:
      - os: B
        runtime-version: X
      - os: B
        runtime-version: Y
      - os: C
        runtime-version: X
      - os: C
        runtime-version: Y
steps:
  - id: checkout
    uses: actions/checkout@v2
  - id: provision
    name: Set up runtime ${{ matrix.runtime-version }}
    uses: setup-runtime
    with:
      version: ${{ matrix.runtime-version }}
  - id: install
    run: python -m pip install --upgrade pip
  - id: lint
    run: flake8 src tests
  - id: test
    run: pytest
  - id: capture
    if: failure()
    uses: actions/upload-artifact@v2
    with:
      name: test_outputs
      path: ./tests/apitests_output
"#;
