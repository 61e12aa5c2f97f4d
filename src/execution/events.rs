//! Execution events emitted while a run progresses

use crate::core::{JobOutcome, RunStatus};
use crate::execution::artifacts::ArtifactReceipt;
use std::sync::Arc;
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        workflow: String,
        total_jobs: usize,
    },
    JobStarted {
        job: String,
    },
    StepStarted {
        job: String,
        step_id: String,
        name: String,
    },
    StepOutput {
        job: String,
        step_id: String,
        output: String,
    },
    StepCompleted {
        job: String,
        step_id: String,
        exit_code: i32,
    },
    StepFailed {
        job: String,
        step_id: String,
        exit_code: Option<i32>,
        error: String,
    },
    StepSkipped {
        job: String,
        step_id: String,
        reason: String,
    },
    ArtifactCaptured {
        job: String,
        receipt: ArtifactReceipt,
    },
    JobCompleted {
        job: String,
        outcome: JobOutcome,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Fan-out of events to every registered handler.
///
/// Handlers are called from whichever job task produced the event, so events
/// of different jobs may interleave.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Vec<EventHandler>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event handler
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    pub fn emit(&self, event: ExecutionEvent) {
        for handler in &self.handlers {
            handler(event.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
