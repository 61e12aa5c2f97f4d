//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every job succeeded
    Succeeded,
    /// At least one job failed
    Failed,
    /// Expansion produced no job instances
    NoJobs,
}

impl RunStatus {
    /// Whether the run should be reported as a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, RunStatus::Failed)
    }

    /// Stable label used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "Succeeded",
            RunStatus::Failed => "Failed",
            RunStatus::NoJobs => "NoJobs",
        }
    }

    /// Parse a label written by `as_str`
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Succeeded" => Some(RunStatus::Succeeded),
            "Failed" => Some(RunStatus::Failed),
            "NoJobs" => Some(RunStatus::NoJobs),
            _ => None,
        }
    }
}

/// Final verdict for one job instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Success,
    Failed,
}

/// State of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepState {
    /// Step exited zero
    Succeeded {
        exit_code: i32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step exited non-zero, or could not be started at all (no exit code)
    Failed {
        exit_code: Option<i32>,
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Step's run-condition evaluated false
    Skipped {
        reason: String,
    },
}

impl StepState {
    /// Whether the step actually ran (as opposed to being skipped)
    pub fn was_executed(&self) -> bool {
        matches!(self, StepState::Succeeded { .. } | StepState::Failed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepState::Failed { .. })
    }

    /// Exit status, when the step ran a process that exited
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StepState::Succeeded { exit_code, .. } => Some(*exit_code),
            StepState::Failed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

/// Recorded result of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub name: String,
    pub state: StepState,
    /// Combined stdout/stderr, empty for skipped steps
    pub output: String,
    /// Gated by `failure()` or `always()`; such steps never decide the outcome
    #[serde(default)]
    pub conditional: bool,
}

/// Ordered, append-only history of a job's step results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    results: Vec<StepResult>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: StepResult) {
        self.results.push(result);
    }

    /// Outcome so far: failed as soon as an unconditional step failed
    pub fn outcome(&self) -> JobOutcome {
        if self.first_failure().is_some() {
            JobOutcome::Failed
        } else {
            JobOutcome::Success
        }
    }

    pub fn get(&self, step_id: &str) -> Option<&StepResult> {
        self.results.iter().find(|r| r.step_id == step_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Ids of the steps that ran, in execution order
    pub fn executed_steps(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.state.was_executed())
            .map(|r| r.step_id.as_str())
            .collect()
    }

    /// First unconditional step that failed, if any
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.results
            .iter()
            .find(|r| !r.conditional && r.state.is_failed())
    }
}
