//! Job context - per-instance environment and template rendering

use crate::core::matrix::JobInstance;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

fn matrix_reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{\{\s*matrix\.([A-Za-z0-9_-]+)\s*\}\}").expect("valid matrix reference pattern")
    })
}

/// Axis names referenced as `${{ matrix.<axis> }}` in a template
pub fn matrix_references(template: &str) -> Vec<String> {
    matrix_reference_regex()
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect()
}

/// Environment variable name for an axis: `runtime-version` -> `MATRIX_RUNTIME_VERSION`
pub fn matrix_env_key(axis: &str) -> String {
    let normalized: String = axis
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("MATRIX_{}", normalized)
}

/// Execution context for one job instance
///
/// Owned exclusively by the job's task; nothing here is shared with sibling jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobContext {
    pub run_id: Uuid,

    /// Display name, e.g. `Tests (ubuntu-latest, 3.9)`
    pub job_name: String,

    pub instance: JobInstance,

    /// Isolated working directory for this job
    pub workspace: PathBuf,

    /// Environment passed to every step (grows as steps export values)
    pub env: HashMap<String, String>,
}

impl JobContext {
    pub fn new(
        run_id: Uuid,
        job_name: String,
        instance: JobInstance,
        workspace: PathBuf,
        workflow_env: &HashMap<String, String>,
    ) -> Self {
        let mut ctx = Self {
            run_id,
            job_name,
            instance,
            workspace,
            env: HashMap::new(),
        };

        for (key, value) in workflow_env {
            let rendered = ctx.render(value);
            ctx.env.insert(key.clone(), rendered);
        }
        for (axis, value) in ctx.instance.assignment.clone() {
            ctx.env.insert(matrix_env_key(&axis), value);
        }
        ctx.env.insert("JOB_NAME".to_string(), ctx.job_name.clone());
        ctx.env
            .insert("WORKSPACE".to_string(), ctx.workspace.display().to_string());

        ctx
    }

    /// Export a variable to all subsequent steps
    pub fn export(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env.insert(key.into(), value.into());
    }

    pub fn get_env(&self, key: &str) -> Option<&String> {
        self.env.get(key)
    }

    /// Substitute `${{ matrix.<axis> }}` with this instance's values.
    /// References to unknown axes are left untouched.
    pub fn render(&self, template: &str) -> String {
        matrix_reference_regex()
            .replace_all(template, |caps: &regex::Captures| {
                match self.instance.get(&caps[1]) {
                    Some(value) => value.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Environment for a step: job environment overlaid with the step's own
    pub fn env_for_step(&self, step_env: &HashMap<String, String>) -> HashMap<String, String> {
        let mut env = self.env.clone();
        for (key, value) in step_env {
            env.insert(key.clone(), self.render(value));
        }
        env
    }

    /// Resolve a path relative to the workspace; absolute paths are kept
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.workspace.join(candidate)
        }
    }
}
