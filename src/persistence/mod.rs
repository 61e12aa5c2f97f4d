//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

pub use crate::core::RunStatus;
use crate::core::{JobOutcome, TriggerEvent};
use crate::execution::RunReport;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of one job instance within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Display name, e.g. `Tests (ubuntu-latest, 3.9)`
    pub name: String,

    pub outcome: JobOutcome,

    /// First step that failed, if any
    pub failed_step: Option<String>,

    /// Ids of steps that actually ran
    pub executed_steps: Vec<String>,

    /// Names of artifacts captured by the job
    pub artifacts: Vec<String>,
}

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Workflow name
    pub workflow_name: String,

    /// Event that triggered the run, if any
    pub event: Option<TriggerEvent>,

    /// Aggregate status
    pub status: RunStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run completed
    pub completed_at: Option<DateTime<Utc>>,

    /// Number of job instances
    pub total_jobs: usize,

    /// Number of failed job instances
    pub failed_jobs: usize,

    pub jobs: Vec<JobSummary>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List all runs of a workflow, newest first
    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>>;

    /// List all workflow names
    async fn list_workflows(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
    by_workflow: RwLock<HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            by_workflow: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let previous = self.runs.write().await.insert(run.run_id, run.clone());

        if previous.is_none() {
            self.by_workflow
                .write()
                .await
                .entry(run.workflow_name.clone())
                .or_default()
                .push(run.run_id);
        }

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, workflow_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let by_workflow = self.by_workflow.read().await;

        let mut result: Vec<RunSummary> = by_workflow
            .get(workflow_name)
            .map(|ids| ids.iter().filter_map(|id| runs.get(id).cloned()).collect())
            .unwrap_or_default();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_workflows(&self) -> Result<Vec<String>> {
        let by_workflow = self.by_workflow.read().await;
        let mut names: Vec<String> = by_workflow.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Create a summary from a finished run
pub fn create_summary(report: &RunReport) -> RunSummary {
    let jobs: Vec<JobSummary> = report
        .jobs
        .iter()
        .map(|job| JobSummary {
            name: job.name.clone(),
            outcome: job.outcome,
            failed_step: job.steps.first_failure().map(|s| s.step_id.clone()),
            executed_steps: job
                .steps
                .executed_steps()
                .into_iter()
                .map(String::from)
                .collect(),
            artifacts: job.artifacts.iter().map(|a| a.name.clone()).collect(),
        })
        .collect();

    RunSummary {
        run_id: report.run_id,
        workflow_name: report.workflow_name.clone(),
        event: report.event.clone(),
        status: report.status,
        started_at: report.started_at,
        completed_at: Some(report.completed_at),
        total_jobs: jobs.len(),
        failed_jobs: jobs.iter().filter(|j| j.outcome == JobOutcome::Failed).count(),
        jobs,
    }
}
