//! CLI command definitions

use crate::core::TriggerEvent;
use crate::execution::{RunnerSettings, SchedulingStrategy};
use clap::Args;
use std::path::PathBuf;

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long, env = "MATRIX_PIPELINE_FILE")]
    pub file: String,

    /// Event to simulate; the run is skipped if the workflow doesn't accept it
    #[arg(long, value_enum, requires = "branch")]
    pub event: Option<EventArg>,

    /// Branch the event refers to
    #[arg(long, requires = "event")]
    pub branch: Option<String>,

    /// Extra workflow environment (KEY=VALUE)
    #[arg(long, value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Parallel)]
    pub strategy: SchedulingStrategyArg,

    /// Override the workflow's max-parallel (at least 1)
    #[arg(
        long,
        env = "MATRIX_PIPELINE_MAX_PARALLEL",
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_parallel: Option<usize>,

    /// Source tree copied by `checkout` steps
    #[arg(long, env = "MATRIX_PIPELINE_SOURCE")]
    pub source: Option<PathBuf>,

    /// Root directory for job workspaces
    #[arg(long, env = "MATRIX_PIPELINE_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Root directory for captured artifacts
    #[arg(long, env = "MATRIX_PIPELINE_ARTIFACTS_DIR")]
    pub artifacts_dir: Option<PathBuf>,

    /// Leave job workspaces on disk after the run
    #[arg(long)]
    pub keep_workspaces: bool,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

impl RunCommand {
    /// Event described by `--event` and `--branch`
    pub fn trigger_event(&self) -> Option<TriggerEvent> {
        let branch = self.branch.clone()?;
        match self.event? {
            EventArg::Push => Some(TriggerEvent::push(branch)),
            EventArg::PullRequest => Some(TriggerEvent::pull_request(branch)),
        }
    }

    /// Runner settings: defaults overridden by flags
    pub fn runner_settings(&self) -> RunnerSettings {
        let mut settings = RunnerSettings::with_defaults();
        if let Some(source) = &self.source {
            settings.source_dir = source.clone();
        }
        if let Some(work_dir) = &self.work_dir {
            settings.work_root = work_dir.clone();
        }
        if let Some(artifacts_dir) = &self.artifacts_dir {
            settings.artifacts_root = artifacts_dir.clone();
        }
        settings.keep_workspaces = self.keep_workspaces;
        settings
    }
}

/// Validate a workflow file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long, env = "MATRIX_PIPELINE_FILE")]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the expanded job instances without running anything
#[derive(Debug, Args, Clone)]
pub struct MatrixCommand {
    /// Path to workflow YAML file
    #[arg(short, long, env = "MATRIX_PIPELINE_FILE")]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List workflows in the run history
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show run counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Workflow name to filter by
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Event kind argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventArg {
    Push,
    PullRequest,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl From<SchedulingStrategyArg> for SchedulingStrategy {
    fn from(arg: SchedulingStrategyArg) -> Self {
        match arg {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(4),
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
