//! Workflow domain model

use crate::core::{
    config::WorkflowConfig,
    matrix::{JobInstance, Matrix},
    step::Step,
    trigger::{TriggerEvent, Triggers},
};
use anyhow::Result;
use std::collections::HashMap;

/// A validated workflow definition, immutable for the duration of a run
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Events that start the workflow
    pub triggers: Triggers,

    /// Axes and exclusions
    pub matrix: Matrix,

    /// Ordered step template shared by every job instance
    pub steps: Vec<Step>,

    /// Environment exported to every step
    pub env: HashMap<String, String>,

    /// Upper bound on concurrently running jobs
    pub max_parallel: Option<usize>,
}

impl Workflow {
    /// Create a workflow from configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self> {
        config.validate()?;

        Ok(Workflow {
            name: config.name.clone(),
            triggers: config.triggers()?,
            matrix: config.matrix()?,
            steps: config.build_steps()?,
            env: config.env(),
            max_parallel: config.max_parallel(),
        })
    }

    /// Expand the matrix into job instances
    pub fn expand(&self) -> Vec<JobInstance> {
        self.matrix.expand()
    }

    /// Whether an event starts this workflow
    pub fn is_triggered_by(&self, event: &TriggerEvent) -> bool {
        self.triggers.matches(event)
    }

    /// Display name of a job instance
    pub fn job_name(&self, instance: &JobInstance) -> String {
        instance.name(&self.name)
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}
