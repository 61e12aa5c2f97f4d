//! Main execution engine - orchestrates a whole matrix run

use crate::{
    core::{JobInstance, JobOutcome, RunStatus, StepLog, StepResult, StepState, TriggerEvent, Workflow},
    execution::{
        artifacts::ArtifactStore,
        events::{EventBus, ExecutionEvent},
        executor::{JobExecutor, JobReport},
        runner::CommandRunner,
        scheduler::{JobScheduler, SchedulingStrategy},
        workspace::RunnerSettings,
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{error, info};
use uuid::Uuid;

/// Aggregate result of one triggered run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub workflow_name: String,
    pub event: Option<TriggerEvent>,
    pub status: RunStatus,

    /// One report per job instance, in expansion order
    pub jobs: Vec<JobReport>,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        !self.status.is_failure()
    }

    pub fn failed_jobs(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| j.outcome == JobOutcome::Failed)
    }

    /// Report for a job by display name
    pub fn job(&self, name: &str) -> Option<&JobReport> {
        self.jobs.iter().find(|j| j.name == name)
    }
}

/// Main matrix execution engine
pub struct ExecutionEngine {
    runner: Arc<dyn CommandRunner>,
    artifacts: Arc<dyn ArtifactStore>,
    settings: RunnerSettings,
    scheduler: JobScheduler,
    events: EventBus,
}

impl ExecutionEngine {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        artifacts: Arc<dyn ArtifactStore>,
        settings: RunnerSettings,
        strategy: SchedulingStrategy,
    ) -> Self {
        Self {
            runner,
            artifacts,
            settings,
            scheduler: JobScheduler::new(strategy),
            events: EventBus::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler);
    }

    /// Expand the workflow's matrix and run every job instance.
    ///
    /// A failing job never stops its siblings. The run fails if any job
    /// failed; an empty expansion yields `RunStatus::NoJobs`.
    pub async fn execute(&self, workflow: &Workflow, event: Option<TriggerEvent>) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let instances = workflow.expand();

        info!(
            "Starting run {} of {} ({} jobs)",
            run_id,
            workflow.name,
            instances.len()
        );
        self.events.emit(ExecutionEvent::RunStarted {
            run_id,
            workflow: workflow.name.clone(),
            total_jobs: instances.len(),
        });

        let jobs = if instances.is_empty() {
            info!("Matrix for {} expanded to no jobs", workflow.name);
            Vec::new()
        } else if self.scheduler.is_sequential(instances.len(), workflow.max_parallel) {
            self.run_sequential(run_id, workflow, instances).await
        } else {
            self.run_concurrent(run_id, workflow, instances).await
        };

        let status = aggregate_status(&jobs);
        info!("Run {} of {} finished: {:?}", run_id, workflow.name, status);
        self.events.emit(ExecutionEvent::RunCompleted { run_id, status });

        RunReport {
            run_id,
            workflow_name: workflow.name.clone(),
            event,
            status,
            jobs,
            started_at,
            completed_at: Utc::now(),
        }
    }

    fn executor(&self) -> JobExecutor {
        JobExecutor::new(
            self.runner.clone(),
            self.artifacts.clone(),
            self.settings.clone(),
            self.events.clone(),
        )
    }

    /// One job at a time in expansion order, each in its own task
    async fn run_sequential(&self, run_id: Uuid, workflow: &Workflow, instances: Vec<JobInstance>) -> Vec<JobReport> {
        let executor = Arc::new(self.executor());
        let shared_workflow = Arc::new(workflow.clone());

        let mut reports = Vec::with_capacity(instances.len());
        for instance in instances {
            let executor = Arc::clone(&executor);
            let workflow = Arc::clone(&shared_workflow);
            let job = instance.clone();

            let joined = tokio::spawn(async move { executor.run_job(run_id, &workflow, job).await }).await;
            reports.push(self.finished_report(&shared_workflow, instance, joined));
        }
        reports
    }

    async fn run_concurrent(&self, run_id: Uuid, workflow: &Workflow, instances: Vec<JobInstance>) -> Vec<JobReport> {
        let limit = self
            .scheduler
            .concurrency_limit(instances.len(), workflow.max_parallel);
        info!("Running {} jobs with concurrency {}", instances.len(), limit);

        let semaphore = Arc::new(Semaphore::new(limit));
        let executor = Arc::new(self.executor());
        let shared_workflow = Arc::new(workflow.clone());

        let mut handles = Vec::with_capacity(instances.len());
        for instance in instances {
            let semaphore = Arc::clone(&semaphore);
            let executor = Arc::clone(&executor);
            let workflow = Arc::clone(&shared_workflow);
            let job = instance.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                executor.run_job(run_id, &workflow, job).await
            });
            handles.push((instance, handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (instance, handle) in handles {
            reports.push(self.finished_report(workflow, instance, handle.await));
        }
        reports
    }

    /// Turn a finished job task into its report; a task that died becomes a failed job
    fn finished_report(&self, workflow: &Workflow, instance: JobInstance, joined: Result<JobReport, JoinError>) -> JobReport {
        match joined {
            Ok(report) => report,
            Err(e) => {
                let name = workflow.job_name(&instance);
                error!("Job {} did not finish: {}", name, e);
                self.events.emit(ExecutionEvent::JobCompleted {
                    job: name.clone(),
                    outcome: JobOutcome::Failed,
                });
                aborted_report(name, instance, e.to_string())
            }
        }
    }
}

/// Aggregate job outcomes into the run status
pub fn aggregate_status(jobs: &[JobReport]) -> RunStatus {
    if jobs.is_empty() {
        RunStatus::NoJobs
    } else if jobs.iter().any(|j| j.outcome == JobOutcome::Failed) {
        RunStatus::Failed
    } else {
        RunStatus::Succeeded
    }
}

fn aborted_report(name: String, instance: JobInstance, error: String) -> JobReport {
    let now = Utc::now();
    let mut steps = StepLog::new();
    steps.push(StepResult {
        step_id: "job".to_string(),
        name: "Job task".to_string(),
        state: StepState::Failed {
            exit_code: None,
            error,
            started_at: now,
            failed_at: now,
        },
        output: String::new(),
        conditional: false,
    });

    JobReport {
        instance,
        name,
        outcome: JobOutcome::Failed,
        steps,
        artifacts: Vec::new(),
        started_at: now,
        completed_at: now,
    }
}
