//! Step domain model

use crate::core::{
    condition::RunCondition,
    config::{scalar_to_string, stringify_map, StepConfig},
    context::{matrix_references, JobContext},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Built-in action names
pub const CHECKOUT_ACTION: &str = "checkout";
pub const SETUP_RUNTIME_ACTION: &str = "setup-runtime";
pub const UPLOAD_ARTIFACT_ACTION: &str = "upload-artifact";

/// What to do when an artifact path does not exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFilesPolicy {
    /// Log a warning, step succeeds
    #[default]
    Warn,
    /// Fail the step
    Error,
    /// Succeed silently
    Ignore,
}

/// The unit of work a step performs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepAction {
    /// Run a shell command in the job workspace
    Run { command: String },
    /// Copy the source tree into the job workspace
    Checkout,
    /// Select the runtime for this instance's version
    SetupRuntime {
        version: String,
        executable: Option<String>,
    },
    /// Persist a path from the workspace to the artifact store
    UploadArtifact {
        name: String,
        path: String,
        if_no_files_found: MissingFilesPolicy,
    },
}

impl StepAction {
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Run { .. } => "run",
            StepAction::Checkout => CHECKOUT_ACTION,
            StepAction::SetupRuntime { .. } => SETUP_RUNTIME_ACTION,
            StepAction::UploadArtifact { .. } => UPLOAD_ARTIFACT_ACTION,
        }
    }
}

/// A single step in the workflow's step template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    pub action: StepAction,

    /// Gate evaluated against the job outcome so far
    pub condition: RunCondition,

    /// Step-level environment (may contain matrix references)
    pub env: HashMap<String, String>,

    /// Working directory relative to the job workspace
    pub working_directory: Option<String>,
}

/// Map `owner/name@ref` style references onto the built-in action names
fn normalize_action(uses: &str) -> &str {
    let without_ref = uses.split('@').next().unwrap_or(uses);
    let name = without_ref.rsplit('/').next().unwrap_or(without_ref);
    match name {
        // setup-python, setup-node, ... all provision a runtime
        n if n.starts_with("setup-") => SETUP_RUNTIME_ACTION,
        n => n,
    }
}

fn param(with: &HashMap<String, serde_yaml::Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| with.get(*k))
        .and_then(scalar_to_string)
}

impl Step {
    /// Create a step from a step config; `position` is its index in the template
    pub fn from_config(config: &StepConfig, position: usize) -> Result<Self> {
        let id = config
            .id
            .clone()
            .unwrap_or_else(|| format!("step-{}", position + 1));
        let name = config.name.clone().unwrap_or_else(|| match (&config.run, &config.uses) {
            (_, Some(uses)) if config.id.is_none() => uses.clone(),
            (Some(run), None) if config.id.is_none() => {
                run.lines().next().unwrap_or_default().trim().to_string()
            }
            _ => id.clone(),
        });

        let action = match (&config.run, &config.uses) {
            (Some(_), Some(_)) => {
                anyhow::bail!("Step '{}' declares both 'run' and 'uses'", id)
            }
            (None, None) => anyhow::bail!("Step '{}' must declare 'run' or 'uses'", id),
            (Some(command), None) => StepAction::Run {
                command: command.clone(),
            },
            (None, Some(uses)) => Self::action_from_uses(&id, uses, &config.with)?,
        };

        let condition = match &config.condition {
            Some(expr) => expr
                .parse::<RunCondition>()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Step '{}' has an invalid 'if'", id))?,
            None => RunCondition::default(),
        };

        Ok(Step {
            id,
            name,
            action,
            condition,
            env: stringify_map(&config.env),
            working_directory: config.working_directory.clone(),
        })
    }

    fn action_from_uses(
        id: &str,
        uses: &str,
        with: &HashMap<String, serde_yaml::Value>,
    ) -> Result<StepAction> {
        match normalize_action(uses) {
            CHECKOUT_ACTION => Ok(StepAction::Checkout),
            SETUP_RUNTIME_ACTION => {
                let version = param(with, &["version", "python-version"]).with_context(|| {
                    format!("Step '{}' ({}) requires 'with.version'", id, uses)
                })?;
                Ok(StepAction::SetupRuntime {
                    version,
                    executable: param(with, &["executable"]),
                })
            }
            UPLOAD_ARTIFACT_ACTION => {
                let name = param(with, &["name"]).with_context(|| {
                    format!("Step '{}' ({}) requires 'with.name'", id, uses)
                })?;
                let path = param(with, &["path"]).with_context(|| {
                    format!("Step '{}' ({}) requires 'with.path'", id, uses)
                })?;
                let if_no_files_found = match param(with, &["if-no-files-found"]).as_deref() {
                    None | Some("warn") => MissingFilesPolicy::Warn,
                    Some("error") => MissingFilesPolicy::Error,
                    Some("ignore") => MissingFilesPolicy::Ignore,
                    Some(other) => anyhow::bail!(
                        "Step '{}' has invalid if-no-files-found '{}' (expected warn, error or ignore)",
                        id,
                        other
                    ),
                };
                Ok(StepAction::UploadArtifact {
                    name,
                    path,
                    if_no_files_found,
                })
            }
            other => anyhow::bail!("Step '{}' uses unknown action '{}'", id, other),
        }
    }

    /// Whether the step carries an explicit run-condition
    pub fn is_conditional(&self) -> bool {
        self.condition.is_conditional()
    }

    /// Every matrix axis referenced by this step
    pub fn matrix_references(&self) -> Vec<String> {
        let mut refs = matrix_references(&self.name);
        match &self.action {
            StepAction::Run { command } => refs.extend(matrix_references(command)),
            StepAction::Checkout => {}
            StepAction::SetupRuntime {
                version,
                executable,
            } => {
                refs.extend(matrix_references(version));
                if let Some(exe) = executable {
                    refs.extend(matrix_references(exe));
                }
            }
            StepAction::UploadArtifact { name, path, .. } => {
                refs.extend(matrix_references(name));
                refs.extend(matrix_references(path));
            }
        }
        for value in self.env.values() {
            refs.extend(matrix_references(value));
        }
        if let Some(dir) = &self.working_directory {
            refs.extend(matrix_references(dir));
        }
        refs
    }

    /// Produce a copy with every template rendered for the given job
    pub fn render(&self, ctx: &JobContext) -> Step {
        let action = match &self.action {
            StepAction::Run { command } => StepAction::Run {
                command: ctx.render(command),
            },
            StepAction::Checkout => StepAction::Checkout,
            StepAction::SetupRuntime {
                version,
                executable,
            } => StepAction::SetupRuntime {
                version: ctx.render(version),
                executable: executable.as_ref().map(|e| ctx.render(e)),
            },
            StepAction::UploadArtifact {
                name,
                path,
                if_no_files_found,
            } => StepAction::UploadArtifact {
                name: ctx.render(name),
                path: ctx.render(path),
                if_no_files_found: *if_no_files_found,
            },
        };

        Step {
            id: self.id.clone(),
            name: ctx.render(&self.name),
            action,
            condition: self.condition,
            env: self
                .env
                .iter()
                .map(|(k, v)| (k.clone(), ctx.render(v)))
                .collect(),
            working_directory: self.working_directory.as_ref().map(|d| ctx.render(d)),
        }
    }
}
