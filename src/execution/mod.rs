//! Matrix execution engine

pub mod artifacts;
pub mod engine;
pub mod events;
pub mod executor;
pub mod runner;
pub mod scheduler;
pub mod workspace;

pub use artifacts::{ArtifactError, ArtifactReceipt, ArtifactStore, InMemoryArtifactStore, LocalArtifactStore};
pub use engine::{ExecutionEngine, RunReport};
pub use events::{EventBus, EventHandler, ExecutionEvent};
pub use executor::{ExecutionResult, JobExecutor, JobReport};
pub use runner::{CommandInvocation, CommandOutput, CommandRunner, RunnerError, ShellCommandRunner};
pub use scheduler::{JobScheduler, SchedulingStrategy};
pub use workspace::{JobWorkspace, RunnerSettings, WorkspaceError};
