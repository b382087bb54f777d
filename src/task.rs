//! Task module: the plugin contract and the stage-enforcing wrapper around it.

#![forbid(unsafe_code)]

use crate::data::{SharedTaskData, TaskData};
use crate::invariant_ppt::{
    assert_invariant, FAILURE_TERMINAL, PANIC_CONTAINED, STAGE_ORDER, VALIDATION_GATE,
};
use crate::schema::{Schema, SchemaError};
use crate::stage::{Stage, Step, TestingMode};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The four lifecycle hooks every algorithm plugin implements.
///
/// Hooks report success as a boolean. `run` gets no descriptor: results are
/// staged inside the plugin and only written back in `post_processing`.
pub trait TaskImpl {
    /// Name used in logs and perf statistics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Slot layout checked before `validation` is called, if declared.
    fn schema(&self) -> Option<Schema> {
        None
    }

    /// Check structural preconditions of the descriptor.
    fn validation(&mut self, data: &TaskData) -> bool;

    /// Decode inputs into the plugin's working representation.
    fn pre_processing(&mut self, data: &TaskData) -> bool;

    /// Execute the algorithm on the working representation.
    fn run(&mut self) -> bool;

    /// Copy staged results into the descriptor's outputs.
    fn post_processing(&mut self, data: &mut TaskData) -> bool;
}

impl<T: TaskImpl + ?Sized> TaskImpl for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn schema(&self) -> Option<Schema> {
        (**self).schema()
    }

    fn validation(&mut self, data: &TaskData) -> bool {
        (**self).validation(data)
    }

    fn pre_processing(&mut self, data: &TaskData) -> bool {
        (**self).pre_processing(data)
    }

    fn run(&mut self) -> bool {
        (**self).run()
    }

    fn post_processing(&mut self, data: &mut TaskData) -> bool {
        (**self).post_processing(data)
    }
}

/// Errors surfaced by the lifecycle entry points.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Step issued from a stage that does not accept it; the hook was not called.
    #[error("{step} called on task {task} in stage {stage}")]
    OutOfOrder {
        task: String,
        step: Step,
        stage: Stage,
    },
    /// Step issued after the task was rejected or failed.
    #[error("task {task} is {stage}, {step} refused")]
    Terminated {
        task: String,
        step: Step,
        stage: Stage,
    },
    /// The descriptor does not fit the plugin's declared layout.
    #[error("task {task} input layout: {source}")]
    Schema {
        task: String,
        #[source]
        source: SchemaError,
    },
    /// Validation hook returned `false`.
    #[error("task {task} rejected its input")]
    Rejected { task: String },
    /// Pre-processing, run or post-processing hook returned `false`.
    #[error("task {task} failed during {step}")]
    StepFailed { task: String, step: Step },
    /// A hook panicked; the panic was contained.
    #[error("task {task} panicked during {step}: {message}")]
    Panicked {
        task: String,
        step: Step,
        message: String,
    },
    /// Functional run exceeded its time limit.
    #[error("task {task} took {elapsed:?}, limit is {limit:?}")]
    TimeLimitExceeded {
        task: String,
        limit: Duration,
        elapsed: Duration,
    },
}

impl TaskError {
    /// The lifecycle step this error belongs to.
    pub fn step(&self) -> Step {
        match self {
            Self::OutOfOrder { step, .. }
            | Self::Terminated { step, .. }
            | Self::StepFailed { step, .. }
            | Self::Panicked { step, .. } => *step,
            Self::Schema { .. } | Self::Rejected { .. } => Step::Validation,
            Self::TimeLimitExceeded { .. } => Step::PostProcessing,
        }
    }

    /// Name of the task that produced the error.
    pub fn task(&self) -> &str {
        match self {
            Self::OutOfOrder { task, .. }
            | Self::Terminated { task, .. }
            | Self::Schema { task, .. }
            | Self::Rejected { task }
            | Self::StepFailed { task, .. }
            | Self::Panicked { task, .. }
            | Self::TimeLimitExceeded { task, .. } => task,
        }
    }
}

/// A plugin bound to its descriptor, driven through the lifecycle in order.
#[derive(Debug)]
pub struct Task<P> {
    plugin: P,
    data: SharedTaskData,
    name: String,
    stage: Stage,
    mode: TestingMode,
    time_limit: Option<Duration>,
    started: Option<Instant>,
}

impl<P: TaskImpl> Task<P> {
    /// Bind a plugin to a shared descriptor.
    pub fn new(plugin: P, data: SharedTaskData) -> Self {
        let name = plugin.name().to_string();
        Self {
            plugin,
            data,
            name,
            stage: Stage::Created,
            mode: TestingMode::Functional,
            time_limit: None,
            started: None,
        }
    }

    /// Fail functional runs whose pre-processing to post-processing span exceeds `limit`.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn mode(&self) -> TestingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TestingMode) {
        self.mode = mode;
    }

    /// The descriptor handle; clone it to keep reading results after the task is gone.
    pub fn data(&self) -> &SharedTaskData {
        &self.data
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    pub fn into_plugin(self) -> P {
        self.plugin
    }

    /// Check the declared schema, then the plugin's own preconditions.
    pub fn validation(&mut self) -> Result<(), TaskError> {
        self.enter(Step::Validation)?;
        if let Some(schema) = self.plugin.schema() {
            let checked = schema.check(&self.data.read());
            if let Err(source) = checked {
                self.stage = Stage::Rejected;
                warn!(task = %self.name, error = %source, "descriptor does not match schema");
                return Err(TaskError::Schema {
                    task: self.name.clone(),
                    source,
                });
            }
        }
        let Self { plugin, data, .. } = &mut *self;
        let outcome = contain(|| plugin.validation(&data.read()));
        self.finish(Step::Validation, outcome)
    }

    pub fn pre_processing(&mut self) -> Result<(), TaskError> {
        self.enter(Step::PreProcessing)?;
        self.started = Some(Instant::now());
        let Self { plugin, data, .. } = &mut *self;
        let outcome = contain(|| plugin.pre_processing(&data.read()));
        self.finish(Step::PreProcessing, outcome)
    }

    // Silent on success: run sits inside perf's timed region.
    pub fn run(&mut self) -> Result<(), TaskError> {
        self.enter(Step::Run)?;
        let plugin = &mut self.plugin;
        let outcome = contain(|| plugin.run());
        self.finish(Step::Run, outcome)
    }

    pub fn post_processing(&mut self) -> Result<(), TaskError> {
        self.enter(Step::PostProcessing)?;
        let Self { plugin, data, .. } = &mut *self;
        let outcome = contain(|| plugin.post_processing(&mut data.write()));
        self.finish(Step::PostProcessing, outcome)?;
        self.check_time_limit()
    }

    fn enter(&self, step: Step) -> Result<(), TaskError> {
        if self.stage.is_terminal() {
            return Err(TaskError::Terminated {
                task: self.name.clone(),
                step,
                stage: self.stage,
            });
        }
        if !self.stage.accepts(step) {
            warn!(
                task = %self.name,
                %step,
                stage = %self.stage,
                expected = ?self.stage.expected_step(),
                "lifecycle step out of order"
            );
            return Err(TaskError::OutOfOrder {
                task: self.name.clone(),
                step,
                stage: self.stage,
            });
        }
        Ok(())
    }

    fn finish(&mut self, step: Step, outcome: Result<bool, String>) -> Result<(), TaskError> {
        match outcome {
            Ok(true) => {
                let from = self.stage;
                self.stage = step.target();
                if step != Step::Run {
                    debug!(task = %self.name, %step, stage = %self.stage, "lifecycle step complete");
                    assert_invariant(
                        STAGE_ORDER,
                        from.accepts(step),
                        "Step completed from a stage that admits it",
                        Some(step.as_str()),
                    );
                }
                Ok(())
            }
            Ok(false) => {
                self.stage = step.failure();
                warn!(task = %self.name, %step, "lifecycle step returned false");
                if step == Step::Validation {
                    assert_invariant(
                        VALIDATION_GATE,
                        self.stage == Stage::Rejected,
                        "Rejected input blocks every later step",
                        Some(step.as_str()),
                    );
                    Err(TaskError::Rejected {
                        task: self.name.clone(),
                    })
                } else {
                    assert_invariant(
                        FAILURE_TERMINAL,
                        self.stage.is_terminal(),
                        "Failed step leaves the task terminal",
                        Some(step.as_str()),
                    );
                    Err(TaskError::StepFailed {
                        task: self.name.clone(),
                        step,
                    })
                }
            }
            Err(message) => {
                self.stage = Stage::Failed;
                warn!(task = %self.name, %step, %message, "lifecycle step panicked");
                assert_invariant(
                    PANIC_CONTAINED,
                    self.stage.is_terminal(),
                    "Panicking hook contained at the lifecycle boundary",
                    Some(step.as_str()),
                );
                Err(TaskError::Panicked {
                    task: self.name.clone(),
                    step,
                    message,
                })
            }
        }
    }

    fn check_time_limit(&mut self) -> Result<(), TaskError> {
        if self.mode != TestingMode::Functional {
            return Ok(());
        }
        let (Some(limit), Some(started)) = (self.time_limit, self.started) else {
            return Ok(());
        };
        let elapsed = started.elapsed();
        if elapsed > limit {
            self.stage = Stage::Failed;
            warn!(task = %self.name, ?elapsed, ?limit, "functional run exceeded its time limit");
            return Err(TaskError::TimeLimitExceeded {
                task: self.name.clone(),
                limit,
                elapsed,
            });
        }
        Ok(())
    }
}

/// Run a hook with panic containment.
fn contain<F: FnOnce() -> bool>(hook: F) -> Result<bool, String> {
    panic::catch_unwind(AssertUnwindSafe(hook)).map_err(|payload| panic_message(&*payload))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Slot, SlotKind};
    use crate::dsl::TaskDataBuilder;

    /// Copies its single input to its single output, counting hook calls.
    #[derive(Debug, Default)]
    struct Echo {
        staged: Vec<f64>,
        runs: usize,
        fail_at: Option<Step>,
        panic_at: Option<Step>,
    }

    impl Echo {
        fn hook(&self, step: Step) -> bool {
            if self.panic_at == Some(step) {
                panic!("echo exploded in {step}");
            }
            self.fail_at != Some(step)
        }
    }

    impl TaskImpl for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn schema(&self) -> Option<Schema> {
            Some(Schema::new([SlotKind::F64], [SlotKind::F64]))
        }

        fn validation(&mut self, data: &TaskData) -> bool {
            self.hook(Step::Validation) && data.inputs_count()[0] == data.outputs_count()[0]
        }

        fn pre_processing(&mut self, data: &TaskData) -> bool {
            match data.input_slice::<f64>(0) {
                Ok(values) => self.staged = values.to_vec(),
                Err(_) => return false,
            }
            self.hook(Step::PreProcessing)
        }

        fn run(&mut self) -> bool {
            self.runs += 1;
            self.hook(Step::Run)
        }

        fn post_processing(&mut self, data: &mut TaskData) -> bool {
            self.hook(Step::PostProcessing) && data.write_output(0, &self.staged).is_ok()
        }
    }

    fn echo_data(len: usize, capacity: usize) -> SharedTaskData {
        TaskDataBuilder::new()
            .input_f64((0..len).map(|i| i as f64).collect())
            .output::<f64>(capacity)
            .build_shared()
    }

    fn drive(task: &mut Task<Echo>) -> Result<(), TaskError> {
        task.validation()?;
        task.pre_processing()?;
        task.run()?;
        task.post_processing()
    }

    #[test]
    fn full_lifecycle_writes_output() {
        let data = echo_data(3, 3);
        let mut task = Task::new(Echo::default(), data.clone());
        drive(&mut task).unwrap();
        assert_eq!(task.stage(), Stage::PostProcessed);
        assert_eq!(data.read().output_slice::<f64>(0).unwrap(), &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn run_before_pre_processing_is_refused() {
        let mut task = Task::new(Echo::default(), echo_data(2, 2));
        task.validation().unwrap();
        let err = task.run().unwrap_err();
        assert_eq!(
            err,
            TaskError::OutOfOrder {
                task: "echo".to_string(),
                step: Step::Run,
                stage: Stage::Validated,
            }
        );
        assert_eq!(task.plugin().runs, 0);
        // The refused call leaves the stage untouched.
        task.pre_processing().unwrap();
        task.run().unwrap();
    }

    #[test]
    #[should_panic(expected = "invariant STAGE_ORDER violated at post_processing")]
    fn completing_a_step_that_was_never_admitted_panics() {
        let mut task = Task::new(Echo::default(), echo_data(1, 1));
        task.finish(Step::Validation, Ok(true)).unwrap();
        // Validated does not admit post-processing; only a bypassed `enter` gets here.
        let _ = task.finish(Step::PostProcessing, Ok(true));
    }

    #[test]
    fn post_processing_before_run_is_refused() {
        let mut task = Task::new(Echo::default(), echo_data(2, 2));
        task.validation().unwrap();
        task.pre_processing().unwrap();
        assert!(matches!(
            task.post_processing(),
            Err(TaskError::OutOfOrder { step: Step::PostProcessing, .. })
        ));
    }

    #[test]
    fn rejected_task_is_terminal() {
        let mut task = Task::new(Echo::default(), echo_data(3, 2));
        assert!(matches!(task.validation(), Err(TaskError::Rejected { .. })));
        assert_eq!(task.stage(), Stage::Rejected);
        assert!(matches!(
            task.pre_processing(),
            Err(TaskError::Terminated { stage: Stage::Rejected, .. })
        ));
    }

    #[test]
    fn schema_mismatch_rejects_before_hook() {
        let data = TaskDataBuilder::new()
            .input(Slot::I32(vec![1, 2]))
            .output::<f64>(2)
            .build_shared();
        let mut task = Task::new(Echo::default(), data);
        let err = task.validation().unwrap_err();
        assert!(matches!(err, TaskError::Schema { .. }));
        assert_eq!(err.step(), Step::Validation);
        assert_eq!(task.stage(), Stage::Rejected);
    }

    #[test]
    fn failing_run_is_terminal() {
        let echo = Echo {
            fail_at: Some(Step::Run),
            ..Echo::default()
        };
        let mut task = Task::new(echo, echo_data(2, 2));
        let err = drive(&mut task).unwrap_err();
        assert_eq!(
            err,
            TaskError::StepFailed {
                task: "echo".to_string(),
                step: Step::Run,
            }
        );
        assert_eq!(task.stage(), Stage::Failed);
        assert!(matches!(task.run(), Err(TaskError::Terminated { .. })));
    }

    #[test]
    fn panicking_hook_is_contained() {
        let echo = Echo {
            panic_at: Some(Step::PreProcessing),
            ..Echo::default()
        };
        let mut task = Task::new(echo, echo_data(2, 2));
        task.validation().unwrap();
        match task.pre_processing() {
            Err(TaskError::Panicked { step, message, .. }) => {
                assert_eq!(step, Step::PreProcessing);
                assert!(message.contains("echo exploded"));
            }
            other => panic!("expected contained panic, got {other:?}"),
        }
        assert_eq!(task.stage(), Stage::Failed);
    }

    #[test]
    fn repeated_runs_and_new_logical_run() {
        let mut task = Task::new(Echo::default(), echo_data(2, 2));
        drive(&mut task).unwrap();
        task.validation().unwrap();
        task.pre_processing().unwrap();
        for _ in 0..4 {
            task.run().unwrap();
        }
        task.post_processing().unwrap();
        assert_eq!(task.plugin().runs, 5);
    }

    #[test]
    fn zero_time_limit_fails_functional_run_only() {
        let mut task = Task::new(Echo::default(), echo_data(2, 2)).with_time_limit(Duration::ZERO);
        task.validation().unwrap();
        task.pre_processing().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        task.run().unwrap();
        assert!(matches!(
            task.post_processing(),
            Err(TaskError::TimeLimitExceeded { .. })
        ));

        let mut task = Task::new(Echo::default(), echo_data(2, 2)).with_time_limit(Duration::ZERO);
        task.set_mode(TestingMode::Perf);
        task.validation().unwrap();
        task.pre_processing().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        task.run().unwrap();
        task.post_processing().unwrap();
    }

    #[test]
    fn boxed_plugins_share_one_task_type() {
        let plugins: Vec<Box<dyn TaskImpl>> = vec![Box::new(Echo::default()), Box::new(Echo::default())];
        for plugin in plugins {
            let mut task = Task::new(plugin, echo_data(1, 1));
            assert_eq!(task.name(), "echo");
            task.validation().unwrap();
            task.pre_processing().unwrap();
            task.run().unwrap();
            task.post_processing().unwrap();
        }
    }
}
