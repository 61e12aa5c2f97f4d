//! Core domain models for workflows
//!
//! This module defines the fundamental data structures that represent
//! workflows, their matrix, steps, and execution state.

pub mod condition;
pub mod config;
pub mod context;
pub mod matrix;
pub mod state;
pub mod step;
pub mod trigger;
pub mod workflow;

pub use condition::RunCondition;
pub use context::JobContext;
pub use matrix::{Axis, ExclusionRule, JobInstance, Matrix};
pub use state::*;
pub use step::{Step, StepAction};
pub use trigger::{EventKind, TriggerEvent, Triggers};
pub use workflow::*;
