//! Stage ordering through the public `Task` API.

use parabench::kernels::{Backend, SortTask};
use parabench::{Stage, Step, Task, TaskDataBuilder, TaskError, TaskImpl, TestingMode};

fn sort_task(values: Vec<i32>) -> Task<SortTask> {
    let len = values.len();
    let data = TaskDataBuilder::new()
        .input_i32(values)
        .output::<i32>(len)
        .build_shared();
    Task::new(SortTask::new(Backend::Seq), data)
}

#[test]
fn full_lifecycle_reaches_post_processed() {
    let mut task = sort_task(vec![3, -1, 2]);
    assert_eq!(task.stage(), Stage::Created);
    assert_eq!(task.mode(), TestingMode::Functional);

    task.validation().unwrap();
    assert_eq!(task.stage(), Stage::Validated);
    task.pre_processing().unwrap();
    assert_eq!(task.stage(), Stage::PreProcessed);
    task.run().unwrap();
    assert_eq!(task.stage(), Stage::RunDone);
    task.post_processing().unwrap();
    assert_eq!(task.stage(), Stage::PostProcessed);

    assert_eq!(task.data().read().output_slice::<i32>(0).unwrap(), &[-1, 2, 3]);
}

#[test]
fn skipping_a_step_is_refused_and_stage_kept() {
    let mut task = sort_task(vec![2, 1]);
    let err = task.run().unwrap_err();
    assert!(matches!(
        err,
        TaskError::OutOfOrder {
            step: Step::Run,
            stage: Stage::Created,
            ..
        }
    ));
    assert_eq!(task.stage(), Stage::Created);

    task.validation().unwrap();
    let err = task.post_processing().unwrap_err();
    assert_eq!(err.step(), Step::PostProcessing);
    assert_eq!(task.stage(), Stage::Validated);

    // Ordering resumes normally afterwards.
    task.pre_processing().unwrap();
    task.run().unwrap();
    task.post_processing().unwrap();
    assert_eq!(task.data().read().output_slice::<i32>(0).unwrap(), &[1, 2]);
}

#[test]
fn run_repeats_before_post_processing() {
    let mut task = sort_task(vec![9, 8, 7]);
    task.validation().unwrap();
    task.pre_processing().unwrap();
    for _ in 0..4 {
        task.run().unwrap();
        assert_eq!(task.stage(), Stage::RunDone);
    }
    task.post_processing().unwrap();
    assert_eq!(task.data().read().output_slice::<i32>(0).unwrap(), &[7, 8, 9]);
}

#[test]
fn new_logical_run_starts_from_post_processed() {
    let mut task = sort_task(vec![4, 2]);
    for _ in 0..2 {
        task.validation().unwrap();
        task.pre_processing().unwrap();
        task.run().unwrap();
        task.post_processing().unwrap();
    }
    assert_eq!(task.stage(), Stage::PostProcessed);
    assert!(matches!(
        task.pre_processing().unwrap_err(),
        TaskError::OutOfOrder { .. }
    ));
}

#[test]
fn boxed_plugins_share_one_task_type() {
    let plugins: Vec<Box<dyn TaskImpl>> = vec![
        Box::new(SortTask::new(Backend::Seq)),
        Box::new(SortTask::new(Backend::Threads(2))),
        Box::new(SortTask::new(Backend::Rayon)),
    ];
    for plugin in plugins {
        let name = plugin.name().to_string();
        let data = TaskDataBuilder::new()
            .input_i32(vec![5, 0, -5, 10])
            .output::<i32>(4)
            .build_shared();
        let mut task = Task::new(plugin, data);
        assert_eq!(task.name(), name);
        parabench::run_lifecycle(&mut task).unwrap();
        assert_eq!(
            task.data().read().output_slice::<i32>(0).unwrap(),
            &[-5, 0, 5, 10],
            "{name}"
        );
    }
}
