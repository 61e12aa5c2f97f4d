//! Trigger events and branch filters

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of event that can start a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Push => write!(f, "push"),
            EventKind::PullRequest => write!(f, "pull_request"),
        }
    }
}

/// A concrete triggering event: a push to a branch, or a pull request targeting one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: EventKind,
    pub branch: String,
}

impl TriggerEvent {
    pub fn push(branch: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Push,
            branch: branch.into(),
        }
    }

    pub fn pull_request(branch: impl Into<String>) -> Self {
        Self {
            kind: EventKind::PullRequest,
            branch: branch.into(),
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.branch)
    }
}

/// Branch patterns accepted for one event kind.
///
/// `*` matches within a path segment, `**` matches across `/`.
/// An empty pattern list accepts every branch.
#[derive(Debug, Clone)]
pub struct BranchFilter {
    compiled: Vec<Regex>,
}

impl BranchFilter {
    pub fn new(patterns: Vec<String>) -> Result<Self, regex::Error> {
        let compiled = patterns
            .iter()
            .map(|p| Regex::new(&glob_to_regex(p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { compiled })
    }

    pub fn any() -> Self {
        Self { compiled: Vec::new() }
    }

    pub fn matches(&self, branch: &str) -> bool {
        self.compiled.is_empty() || self.compiled.iter().any(|re| re.is_match(branch))
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                out.push_str(".*");
            } else {
                out.push_str("[^/]*");
            }
        } else {
            out.push_str(&regex::escape(&c.to_string()));
        }
    }
    out.push('$');
    out
}

/// Which events start the workflow
#[derive(Debug, Clone, Default)]
pub struct Triggers {
    pub push: Option<BranchFilter>,
    pub pull_request: Option<BranchFilter>,
}

impl Triggers {
    /// Check whether an event starts the workflow. No declared triggers accepts everything.
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        if self.push.is_none() && self.pull_request.is_none() {
            return true;
        }
        let filter = match event.kind {
            EventKind::Push => self.push.as_ref(),
            EventKind::PullRequest => self.pull_request.as_ref(),
        };
        filter.is_some_and(|f| f.matches(&event.branch))
    }
}
