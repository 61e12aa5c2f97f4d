//! Workflow configuration from YAML

use crate::core::{
    context::matrix_references,
    matrix::{Axis, ExclusionRule, Matrix},
    step::Step,
    trigger::{BranchFilter, Triggers},
    Workflow,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name, also the base of every job name
    pub name: String,

    /// Events that start the workflow
    #[serde(default)]
    pub on: Option<TriggerConfig>,

    /// Environment exported to every step
    #[serde(default)]
    env: HashMap<String, Value>,

    /// Matrix strategy
    #[serde(default)]
    pub strategy: Option<StrategyConfig>,

    /// Ordered step template
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// `on:` section. A listed event with no body (`push:`) accepts every branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default, deserialize_with = "listed_event")]
    pub push: Option<BranchesConfig>,

    #[serde(default, deserialize_with = "listed_event")]
    pub pull_request: Option<BranchesConfig>,
}

fn listed_event<'de, D>(deserializer: D) -> std::result::Result<Option<BranchesConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let branches = Option::<BranchesConfig>::deserialize(deserializer)?;
    Ok(Some(branches.unwrap_or_default()))
}

/// Branch filter for one event kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchesConfig {
    #[serde(default)]
    pub branches: Vec<String>,
}

/// `strategy:` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Axis name -> values, plus the reserved `exclude` key
    #[serde(default)]
    pub matrix: Mapping,

    /// Maximum number of jobs running at once
    #[serde(default, rename = "max-parallel")]
    pub max_parallel: Option<usize>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step identifier (defaults to `step-<n>`)
    #[serde(default)]
    pub id: Option<String>,

    /// Human-readable step name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    /// Shell command to run
    #[serde(default)]
    pub run: Option<String>,

    /// Built-in action to invoke
    #[serde(default)]
    pub uses: Option<String>,

    /// Action parameters
    #[serde(default)]
    pub with: HashMap<String, Value>,

    /// Run-condition expression
    #[serde(default, rename = "if")]
    pub condition: Option<String>,

    /// Step-level environment
    #[serde(default)]
    pub env: HashMap<String, Value>,

    /// Directory relative to the job workspace
    #[serde(default, rename = "working-directory")]
    pub working_directory: Option<String>,
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Workflow name must not be empty");
        }

        let matrix = self.matrix()?;
        self.triggers()?;

        let steps = self.build_steps()?;

        let mut seen_ids = HashSet::new();
        for step in &steps {
            if !seen_ids.insert(step.id.as_str()) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }
        }

        for step in &steps {
            for axis in step.matrix_references() {
                if matrix.axis(&axis).is_none() {
                    anyhow::bail!(
                        "Step '{}' references undeclared matrix axis '{}'",
                        step.id,
                        axis
                    );
                }
            }
        }

        for value in self.env().values() {
            for axis in matrix_references(value) {
                if matrix.axis(&axis).is_none() {
                    anyhow::bail!("Workflow env references undeclared matrix axis '{}'", axis);
                }
            }
        }

        if let Some(0) = self.max_parallel() {
            anyhow::bail!("strategy.max-parallel must be at least 1");
        }

        Ok(())
    }

    /// Build the matrix declared under `strategy.matrix`
    pub fn matrix(&self) -> Result<Matrix> {
        let Some(strategy) = &self.strategy else {
            return Ok(Matrix::default());
        };

        let mut axes = Vec::new();
        let mut raw_exclusions = None;

        for (key, value) in &strategy.matrix {
            let name = key
                .as_str()
                .context("Matrix axis names must be strings")?;

            match name {
                "exclude" => raw_exclusions = Some(value),
                "include" => anyhow::bail!("Matrix 'include' entries are not supported"),
                _ => {
                    let values = value
                        .as_sequence()
                        .with_context(|| format!("Matrix axis '{}' must be a list of values", name))?;
                    if values.is_empty() {
                        anyhow::bail!("Matrix axis '{}' must declare at least one value", name);
                    }

                    let mut declared = Vec::with_capacity(values.len());
                    for v in values {
                        let value = scalar_to_string(v).with_context(|| {
                            format!("Matrix axis '{}' has a non-scalar value", name)
                        })?;
                        if declared.contains(&value) {
                            anyhow::bail!("Matrix axis '{}' declares '{}' twice", name, value);
                        }
                        declared.push(value);
                    }
                    axes.push(Axis::new(name, declared));
                }
            }
        }

        let mut exclusions = Vec::new();
        if let Some(raw) = raw_exclusions {
            let entries = raw
                .as_sequence()
                .context("Matrix 'exclude' must be a list of mappings")?;

            for entry in entries {
                let map = entry
                    .as_mapping()
                    .context("Matrix 'exclude' entries must be mappings")?;
                let mut constraints = Vec::with_capacity(map.len());

                for (k, v) in map {
                    let axis_name = k.as_str().context("Exclusion keys must be strings")?;
                    let value = scalar_to_string(v).with_context(|| {
                        format!("Exclusion value for '{}' must be a scalar", axis_name)
                    })?;

                    let axis = axes
                        .iter()
                        .find(|a: &&Axis| a.name == axis_name)
                        .with_context(|| {
                            format!("Exclusion references undeclared axis '{}'", axis_name)
                        })?;
                    if !axis.contains(&value) {
                        anyhow::bail!(
                            "Exclusion references undeclared value '{}' for axis '{}'",
                            value,
                            axis_name
                        );
                    }
                    constraints.push((axis_name.to_string(), value));
                }

                if constraints.is_empty() {
                    anyhow::bail!("Matrix 'exclude' entries must constrain at least one axis");
                }
                exclusions.push(ExclusionRule { constraints });
            }
        }

        Ok(Matrix::new(axes, exclusions))
    }

    /// Build trigger filters from the `on:` section
    pub fn triggers(&self) -> Result<Triggers> {
        let Some(on) = &self.on else {
            return Ok(Triggers::default());
        };

        let build = |cfg: &Option<BranchesConfig>| -> Result<Option<BranchFilter>> {
            cfg.as_ref()
                .map(|b| {
                    BranchFilter::new(b.branches.clone()).context("Invalid branch pattern")
                })
                .transpose()
        };

        Ok(Triggers {
            push: build(&on.push)?,
            pull_request: build(&on.pull_request)?,
        })
    }

    /// Build the ordered step list
    pub fn build_steps(&self) -> Result<Vec<Step>> {
        self.steps
            .iter()
            .enumerate()
            .map(|(position, cfg)| Step::from_config(cfg, position))
            .collect()
    }

    /// Workflow-level environment as strings
    pub fn env(&self) -> HashMap<String, String> {
        stringify_map(&self.env)
    }

    pub fn max_parallel(&self) -> Option<usize> {
        self.strategy.as_ref().and_then(|s| s.max_parallel)
    }

    /// Convert config to a Workflow domain model
    pub fn to_workflow(&self) -> Result<Workflow> {
        Workflow::from_config(self)
    }
}

/// Render a YAML scalar as a string; `None` for sequences and mappings
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Convert a YAML map into strings, dropping non-scalar values
pub fn stringify_map(map: &HashMap<String, Value>) -> HashMap<String, String> {
    map.iter()
        .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
        .collect()
}
