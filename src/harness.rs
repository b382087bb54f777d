//! Lifecycle harness: drives a task through one logical run for correctness checks.

use crate::data::{SharedTaskData, TaskData};
use crate::stage::Stage;
use crate::task::{Task, TaskError, TaskImpl};
use std::sync::Arc;
use std::time::Duration;

/// Run validation, pre-processing, run and post-processing once, stopping at the first error.
pub fn run_lifecycle<P: TaskImpl>(task: &mut Task<P>) -> Result<(), TaskError> {
    task.validation()?;
    task.pre_processing()?;
    task.run()?;
    task.post_processing()
}

/// Harness for functional runs: owns the task and keeps a handle on its descriptor.
pub struct LifecycleHarness<P> {
    task: Task<P>,
}

impl<P: TaskImpl> LifecycleHarness<P> {
    /// Create harness from a plugin and the descriptor it will be bound to.
    pub fn new(plugin: P, data: TaskData) -> Self {
        Self {
            task: Task::new(plugin, data.shared()),
        }
    }

    /// Fail the run if it takes longer than `limit`.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.task = self.task.with_time_limit(limit);
        self
    }

    /// Drive the full lifecycle once.
    pub fn run_once(&mut self) -> Result<(), TaskError> {
        run_lifecycle(&mut self.task)
    }

    pub fn stage(&self) -> Stage {
        self.task.stage()
    }

    /// Shared handle on the descriptor, for reading outputs.
    pub fn data(&self) -> SharedTaskData {
        Arc::clone(self.task.data())
    }

    pub fn into_task(self) -> Task<P> {
        self.task
    }
}
