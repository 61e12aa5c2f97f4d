//! Job executor - runs one job instance's step sequence

use crate::{
    core::{
        step::MissingFilesPolicy, JobContext, JobInstance, JobOutcome, RunCondition, Step,
        StepAction, StepLog, StepResult, StepState, Workflow,
    },
    execution::{
        artifacts::{ArtifactError, ArtifactReceipt, ArtifactRequest, ArtifactStore},
        events::{EventBus, ExecutionEvent},
        runner::{CommandInvocation, CommandRunner},
        workspace::{checkout_into, JobWorkspace, RunnerSettings, WorkspaceError},
    },
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default probe target when `setup-runtime` has no explicit executable
const DEFAULT_RUNTIME_PREFIX: &str = "python";

/// Result of executing a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Step exited zero
    Success { exit_code: i32, output: String },
    /// Step exited non-zero or could not run
    Failed {
        exit_code: Option<i32>,
        output: String,
        error: String,
    },
}

impl ExecutionResult {
    fn failed(error: impl Into<String>) -> Self {
        ExecutionResult::Failed {
            exit_code: None,
            output: String::new(),
            error: error.into(),
        }
    }
}

/// Everything reported for one finished job instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub instance: JobInstance,
    pub name: String,
    pub outcome: JobOutcome,
    pub steps: StepLog,
    pub artifacts: Vec<ArtifactReceipt>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.outcome == JobOutcome::Success
    }

    /// State of a step by id
    pub fn step_state(&self, step_id: &str) -> Option<&StepState> {
        self.steps.get(step_id).map(|r| &r.state)
    }
}

/// Executes the step template for a single job instance
pub struct JobExecutor {
    runner: Arc<dyn CommandRunner>,
    artifacts: Arc<dyn ArtifactStore>,
    settings: RunnerSettings,
    events: EventBus,
}

impl JobExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        artifacts: Arc<dyn ArtifactStore>,
        settings: RunnerSettings,
        events: EventBus,
    ) -> Self {
        Self {
            runner,
            artifacts,
            settings,
            events,
        }
    }

    /// Run every step of the workflow for one instance.
    ///
    /// Steps run strictly in order. A step whose run-condition is false
    /// against the log so far is recorded as skipped; this is what makes the
    /// first failure short-circuit the remaining default steps while
    /// `failure()` steps still run. There are no retries.
    pub async fn run_job(&self, run_id: Uuid, workflow: &Workflow, instance: JobInstance) -> JobReport {
        let name = workflow.job_name(&instance);
        let started_at = Utc::now();
        info!("Starting job: {}", name);
        self.events.emit(ExecutionEvent::JobStarted { job: name.clone() });

        let mut log = StepLog::new();
        let workspace = match self.create_workspace(run_id, instance.slug()).await {
            Ok(ws) => Some(ws),
            Err(e) => {
                warn!("Job {} could not set up its workspace: {}", name, e);
                log.push(StepResult {
                    step_id: "set-up-job".to_string(),
                    name: "Set up job".to_string(),
                    state: StepState::Failed {
                        exit_code: None,
                        error: e.to_string(),
                        started_at,
                        failed_at: Utc::now(),
                    },
                    output: String::new(),
                    conditional: false,
                });
                None
            }
        };

        let workspace_path = workspace
            .as_ref()
            .map(|ws| ws.path().to_path_buf())
            .unwrap_or_else(|| {
                self.settings
                    .work_root
                    .join(run_id.to_string())
                    .join(instance.slug())
            });
        let mut ctx = JobContext::new(run_id, name.clone(), instance.clone(), workspace_path, &workflow.env);
        let mut artifacts = Vec::new();

        for template in &workflow.steps {
            if !template.condition.evaluate(&log) {
                let reason = match template.condition {
                    RunCondition::Failure => "job has not failed",
                    _ => "a previous step failed",
                };
                debug!("Skipping step {} in {}: {}", template.id, name, reason);
                self.events.emit(ExecutionEvent::StepSkipped {
                    job: name.clone(),
                    step_id: template.id.clone(),
                    reason: reason.to_string(),
                });
                log.push(StepResult {
                    step_id: template.id.clone(),
                    name: template.name.clone(),
                    state: StepState::Skipped {
                        reason: reason.to_string(),
                    },
                    output: String::new(),
                    conditional: template.is_conditional(),
                });
                continue;
            }

            let step = template.render(&ctx);
            self.events.emit(ExecutionEvent::StepStarted {
                job: name.clone(),
                step_id: step.id.clone(),
                name: step.name.clone(),
            });

            let step_started = Utc::now();
            let result = self.execute_step(&step, &mut ctx, &mut artifacts).await;
            let finished = Utc::now();

            let (state, output) = match result {
                ExecutionResult::Success { exit_code, output } => {
                    self.events.emit(ExecutionEvent::StepCompleted {
                        job: name.clone(),
                        step_id: step.id.clone(),
                        exit_code,
                    });
                    (
                        StepState::Succeeded {
                            exit_code,
                            started_at: step_started,
                            completed_at: finished,
                        },
                        output,
                    )
                }
                ExecutionResult::Failed {
                    exit_code,
                    output,
                    error,
                } => {
                    warn!("Step {} failed in {}: {}", step.id, name, error);
                    self.events.emit(ExecutionEvent::StepFailed {
                        job: name.clone(),
                        step_id: step.id.clone(),
                        exit_code,
                        error: error.clone(),
                    });
                    (
                        StepState::Failed {
                            exit_code,
                            error,
                            started_at: step_started,
                            failed_at: finished,
                        },
                        output,
                    )
                }
            };

            if !output.is_empty() {
                self.events.emit(ExecutionEvent::StepOutput {
                    job: name.clone(),
                    step_id: step.id.clone(),
                    output: output.clone(),
                });
            }

            log.push(StepResult {
                step_id: step.id.clone(),
                name: step.name.clone(),
                state,
                output,
                conditional: step.is_conditional(),
            });
        }

        if let Some(ws) = workspace {
            if let Err(e) = tokio::task::spawn_blocking(move || ws.cleanup()).await {
                warn!("Workspace cleanup for {} did not finish: {}", name, e);
            }
        }

        let outcome = log.outcome();
        info!("Job {} finished: {:?}", name, outcome);
        self.events.emit(ExecutionEvent::JobCompleted {
            job: name.clone(),
            outcome,
        });

        JobReport {
            instance,
            name,
            outcome,
            steps: log,
            artifacts,
            started_at,
            completed_at: Utc::now(),
        }
    }

    async fn create_workspace(&self, run_id: Uuid, slug: String) -> Result<JobWorkspace, WorkspaceError> {
        let settings = self.settings.clone();
        let path = settings.work_root.join(run_id.to_string()).join(&slug);

        tokio::task::spawn_blocking(move || JobWorkspace::create(&settings, run_id, &slug))
            .await
            .unwrap_or_else(|e| {
                Err(WorkspaceError::Create {
                    path,
                    source: std::io::Error::new(std::io::ErrorKind::Other, e),
                })
            })
    }

    /// Execute a single rendered step
    async fn execute_step(
        &self,
        step: &Step,
        ctx: &mut JobContext,
        artifacts: &mut Vec<ArtifactReceipt>,
    ) -> ExecutionResult {
        info!("Executing step: {} ({})", step.id, step.action.kind());

        match &step.action {
            StepAction::Run { command } => self.run_command(step, ctx, command.clone()).await,
            StepAction::Checkout => self.checkout(ctx).await,
            StepAction::SetupRuntime {
                version,
                executable,
            } => {
                let exe = executable
                    .clone()
                    .unwrap_or_else(|| format!("{}{}", DEFAULT_RUNTIME_PREFIX, version));
                let probe = self
                    .run_command(step, ctx, format!("{} --version", exe))
                    .await;
                match probe {
                    ExecutionResult::Success { exit_code, output } => {
                        ctx.export("RUNTIME", exe.clone());
                        ctx.export("RUNTIME_VERSION", version.clone());
                        info!("Selected runtime {} for version {}", exe, version);
                        ExecutionResult::Success { exit_code, output }
                    }
                    ExecutionResult::Failed {
                        exit_code,
                        output,
                        error,
                    } => ExecutionResult::Failed {
                        exit_code,
                        output,
                        error: format!("Runtime '{}' for version {} is not available: {}", exe, version, error),
                    },
                }
            }
            StepAction::UploadArtifact {
                name,
                path,
                if_no_files_found,
            } => {
                self.upload_artifact(ctx, name, path, *if_no_files_found, artifacts)
                    .await
            }
        }
    }

    async fn run_command(&self, step: &Step, ctx: &JobContext, script: String) -> ExecutionResult {
        let working_dir = step
            .working_directory
            .as_deref()
            .map(|dir| ctx.resolve(dir))
            .unwrap_or_else(|| ctx.workspace.clone());

        let invocation = CommandInvocation {
            step_id: step.id.clone(),
            script,
            working_dir,
            env: ctx.env_for_step(&step.env),
        };

        match self.runner.run(&invocation).await {
            Ok(output) => {
                let combined = output.combined();
                match output.exit_code {
                    Some(0) => ExecutionResult::Success {
                        exit_code: 0,
                        output: combined,
                    },
                    Some(code) => ExecutionResult::Failed {
                        exit_code: Some(code),
                        output: combined,
                        error: format!("Process exited with code {}", code),
                    },
                    None => ExecutionResult::Failed {
                        exit_code: None,
                        output: combined,
                        error: "Process terminated by signal".to_string(),
                    },
                }
            }
            Err(e) => ExecutionResult::failed(e.to_string()),
        }
    }

    async fn checkout(&self, ctx: &JobContext) -> ExecutionResult {
        let settings = self.settings.clone();
        let dest = ctx.workspace.clone();

        match tokio::task::spawn_blocking(move || checkout_into(&settings, &dest)).await {
            Ok(Ok(files)) => ExecutionResult::Success {
                exit_code: 0,
                output: format!(
                    "Checked out {} files from {}",
                    files,
                    self.settings.source_dir.display()
                ),
            },
            Ok(Err(e)) => ExecutionResult::failed(e.to_string()),
            Err(e) => ExecutionResult::failed(format!("Checkout task failed: {}", e)),
        }
    }

    async fn upload_artifact(
        &self,
        ctx: &JobContext,
        name: &str,
        path: &str,
        policy: MissingFilesPolicy,
        artifacts: &mut Vec<ArtifactReceipt>,
    ) -> ExecutionResult {
        let request = ArtifactRequest {
            run_id: ctx.run_id,
            job: ctx.instance.slug(),
            name: name.to_string(),
            source: ctx.resolve(path),
        };

        match self.artifacts.capture(&request).await {
            Ok(receipt) => {
                let output = format!(
                    "Uploaded artifact '{}' ({} files) to {}",
                    receipt.name, receipt.files, receipt.location
                );
                self.events.emit(ExecutionEvent::ArtifactCaptured {
                    job: ctx.job_name.clone(),
                    receipt: receipt.clone(),
                });
                artifacts.push(receipt);
                ExecutionResult::Success {
                    exit_code: 0,
                    output,
                }
            }
            Err(ArtifactError::NotFound(missing)) => {
                let message = format!(
                    "No files were found with the provided path: {}. No artifacts will be uploaded.",
                    missing.display()
                );
                match policy {
                    MissingFilesPolicy::Warn => {
                        warn!("{}", message);
                        ExecutionResult::Success {
                            exit_code: 0,
                            output: message,
                        }
                    }
                    MissingFilesPolicy::Ignore => ExecutionResult::Success {
                        exit_code: 0,
                        output: message,
                    },
                    MissingFilesPolicy::Error => ExecutionResult::failed(message),
                }
            }
            Err(e) => ExecutionResult::failed(e.to_string()),
        }
    }
}
