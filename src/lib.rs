//! matrix-pipeline - run a workflow once per build-matrix combination

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use core::{
    JobInstance, JobOutcome, Matrix, RunCondition, RunStatus, Step, StepAction, StepLog, StepState,
    TriggerEvent, Workflow,
};
pub use core::config::WorkflowConfig;
pub use execution::{
    ArtifactStore, CommandRunner, ExecutionEngine, ExecutionEvent, JobReport, RunReport, RunnerSettings,
    SchedulingStrategy,
};
