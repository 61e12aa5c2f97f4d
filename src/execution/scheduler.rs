//! Execution scheduler - decides how many job instances run at once

use serde::{Deserialize, Serialize};

/// Strategy for scheduling job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchedulingStrategy {
    /// Execute jobs one at a time, in expansion order
    #[default]
    Sequential,

    /// Execute all jobs at once
    Parallel,

    /// Limited parallelism (max N concurrent jobs)
    LimitedParallel(usize),
}

/// Scheduler for a run's job instances
#[derive(Debug, Clone, Copy)]
pub struct JobScheduler {
    strategy: SchedulingStrategy,
}

impl JobScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    /// Number of jobs allowed to run concurrently.
    ///
    /// The workflow's `max-parallel` caps whatever the strategy allows.
    /// Never less than one, so every run makes progress.
    pub fn concurrency_limit(&self, job_count: usize, max_parallel: Option<usize>) -> usize {
        let by_strategy = match self.strategy {
            SchedulingStrategy::Sequential => 1,
            SchedulingStrategy::Parallel => job_count,
            SchedulingStrategy::LimitedParallel(max) => max.min(job_count),
        };

        let limit = match max_parallel {
            Some(cap) => by_strategy.min(cap),
            None => by_strategy,
        };

        limit.max(1)
    }

    /// Whether jobs run one at a time
    pub fn is_sequential(&self, job_count: usize, max_parallel: Option<usize>) -> bool {
        self.concurrency_limit(job_count, max_parallel) == 1
    }
}
