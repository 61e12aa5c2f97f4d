//! Step run-condition model

use crate::core::state::{JobOutcome, StepLog};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When a step is allowed to run, evaluated against the job outcome so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunCondition {
    /// Run only while every unconditional step has succeeded (the default)
    #[default]
    Success,
    /// Run only once the job has failed
    Failure,
    /// Run regardless of the outcome
    Always,
}

impl RunCondition {
    /// Evaluate against the step log recorded so far
    pub fn evaluate(&self, log: &StepLog) -> bool {
        match self {
            RunCondition::Success => log.outcome() == JobOutcome::Success,
            RunCondition::Failure => log.outcome() == JobOutcome::Failed,
            RunCondition::Always => true,
        }
    }

    /// Whether the step carries an explicit gate (anything but the default)
    pub fn is_conditional(&self) -> bool {
        !matches!(self, RunCondition::Success)
    }
}

impl FromStr for RunCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut expr = s.trim();
        if let Some(inner) = expr.strip_prefix("${{").and_then(|e| e.strip_suffix("}}")) {
            expr = inner.trim();
        }

        match expr {
            "success()" => Ok(RunCondition::Success),
            "failure()" => Ok(RunCondition::Failure),
            "always()" => Ok(RunCondition::Always),
            other => Err(format!(
                "Unsupported run condition '{}' (expected success(), failure() or always())",
                other
            )),
        }
    }
}

impl fmt::Display for RunCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunCondition::Success => write!(f, "success()"),
            RunCondition::Failure => write!(f, "failure()"),
            RunCondition::Always => write!(f, "always()"),
        }
    }
}
