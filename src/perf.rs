//! Perf module: repeated timed execution of a task.
//!
//! Two protocols are offered. [`Perf::pipeline_run`] times the whole
//! lifecycle per iteration, marshalling included. [`Perf::task_run`] runs
//! validation and pre-processing once, times only the repeated `run` calls,
//! and post-processes once afterwards.

// IMPORTANT: Do not call assert_invariant or any PPT logging between the two timer samples.

use crate::harness::run_lifecycle;
use crate::invariant_ppt::{
    assert_invariant, PERF_SETUP_UNTIMED, PERF_STATISTIC_BOUNDED, PERF_TIMER_MONOTONIC,
};
use crate::stage::{Stage, TestingMode};
use crate::task::{Task, TaskError, TaskImpl};
use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};
use std::time::Instant;
use tracing::{info, warn};

/// Zero-argument clock returning seconds from an arbitrary epoch.
pub type Timer = Box<dyn Fn() -> f64>;

/// A monotonic clock whose epoch is the moment it was created.
pub fn monotonic_clock() -> impl Fn() -> f64 {
    let epoch = Instant::now();
    move || epoch.elapsed().as_secs_f64()
}

/// Measurement configuration.
pub struct PerfAttr {
    /// How many iterations to time.
    pub num_running: u64,
    /// Clock sampled before and after the timed region.
    pub current_timer: Timer,
}

impl PerfAttr {
    /// Default repeat count.
    pub const DEFAULT_NUM_RUNNING: u64 = 10;

    /// Configuration with the given repeat count and a monotonic clock.
    pub fn new(num_running: u64) -> Self {
        Self {
            num_running,
            current_timer: Box::new(monotonic_clock()),
        }
    }

    /// Replace the clock.
    pub fn with_timer(mut self, timer: impl Fn() -> f64 + 'static) -> Self {
        self.current_timer = Box::new(timer);
        self
    }

    fn now(&self) -> f64 {
        (self.current_timer)()
    }
}

impl Default for PerfAttr {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NUM_RUNNING)
    }
}

impl fmt::Debug for PerfAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerfAttr")
            .field("num_running", &self.num_running)
            .finish_non_exhaustive()
    }
}

/// Which protocol produced a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunKind {
    #[default]
    None,
    Pipeline,
    TaskRun,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::None => write!(f, "none"),
            RunKind::Pipeline => write!(f, "pipeline"),
            RunKind::TaskRun => write!(f, "task_run"),
        }
    }
}

/// Timings of one measurement session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PerfResults {
    /// Mean seconds per iteration.
    pub time_sec: f64,
    /// Seconds between the two timer samples.
    pub total_sec: f64,
    pub num_running: u64,
    pub type_of_running: RunKind,
}

impl PerfResults {
    /// Longest mean iteration time a statistic may report.
    pub const MAX_TIME: f64 = 10.0;
}

/// Errors during a measurement session.
#[derive(Debug, thiserror::Error)]
pub enum PerfError {
    #[error("num_running must be at least 1")]
    ZeroRuns,
    #[error("iteration {iteration} failed: {source}")]
    Task {
        iteration: u64,
        #[source]
        source: TaskError,
    },
    #[error("timer is not monotonic: begin {begin}, end {end}")]
    NonMonotonicTimer { begin: f64, end: f64 },
    #[error("no measurement recorded")]
    NotMeasured,
    #[error("task execute time {time_sec}s must be below {max}s")]
    TimeLimit { time_sec: f64, max: f64 },
    #[error("failed to write perf statistic: {0}")]
    Io(#[from] io::Error),
}

/// The measurement driver. Owns its task; hand it back with [`Perf::into_task`].
#[derive(Debug)]
pub struct Perf<P> {
    task: Task<P>,
}

impl<P: TaskImpl> Perf<P> {
    /// Wrap a task and switch it to perf mode.
    pub fn new(mut task: Task<P>) -> Self {
        task.set_mode(TestingMode::Perf);
        Self { task }
    }

    pub fn task(&self) -> &Task<P> {
        &self.task
    }

    pub fn into_task(self) -> Task<P> {
        self.task
    }

    /// Time `num_running` complete lifecycles.
    pub fn pipeline_run(&mut self, attr: &PerfAttr) -> Result<PerfResults, PerfError> {
        check_attr(attr)?;
        let begin = attr.now();
        for iteration in 0..attr.num_running {
            run_lifecycle(&mut self.task).map_err(|source| self.failed(iteration, source))?;
        }
        let end = attr.now();
        self.record(RunKind::Pipeline, attr.num_running, begin, end)
    }

    /// Time `num_running` runs between one untimed setup and one untimed teardown.
    pub fn task_run(&mut self, attr: &PerfAttr) -> Result<PerfResults, PerfError> {
        check_attr(attr)?;
        self.task
            .validation()
            .and_then(|()| self.task.pre_processing())
            .map_err(|source| self.failed(0, source))?;

        let begin = attr.now();
        for iteration in 0..attr.num_running {
            self.task.run().map_err(|source| self.failed(iteration, source))?;
        }
        let end = attr.now();

        let last = attr.num_running - 1;
        self.task
            .post_processing()
            .map_err(|source| self.failed(last, source))?;
        assert_invariant(
            PERF_SETUP_UNTIMED,
            self.task.stage() == Stage::PostProcessed,
            "Setup and teardown ran once outside the timed region",
            Some("task_run"),
        );
        self.record(RunKind::TaskRun, attr.num_running, begin, end)
    }

    /// Print `<task>:<protocol>:<seconds>` to stdout.
    pub fn print_perf_statistic(&self, results: &PerfResults) -> Result<(), PerfError> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write_perf_statistic(results, &mut out)
    }

    /// Write the statistic line to any sink.
    pub fn write_perf_statistic<W: Write>(
        &self,
        results: &PerfResults,
        out: &mut W,
    ) -> Result<(), PerfError> {
        if results.type_of_running == RunKind::None {
            return Err(PerfError::NotMeasured);
        }
        if results.time_sec >= PerfResults::MAX_TIME {
            return Err(PerfError::TimeLimit {
                time_sec: results.time_sec,
                max: PerfResults::MAX_TIME,
            });
        }
        assert_invariant(
            PERF_STATISTIC_BOUNDED,
            results.time_sec < PerfResults::MAX_TIME,
            "Reported time below the statistic limit",
            Some("write_perf_statistic"),
        );
        writeln!(
            out,
            "{}:{}:{:.10}",
            self.task.name(),
            results.type_of_running,
            results.time_sec
        )?;
        Ok(())
    }

    fn failed(&self, iteration: u64, source: TaskError) -> PerfError {
        warn!(task = %self.task.name(), iteration, error = %source, "perf session aborted");
        PerfError::Task { iteration, source }
    }

    fn record(
        &self,
        kind: RunKind,
        num_running: u64,
        begin: f64,
        end: f64,
    ) -> Result<PerfResults, PerfError> {
        match end.partial_cmp(&begin) {
            Some(Ordering::Greater | Ordering::Equal) => {}
            _ => return Err(PerfError::NonMonotonicTimer { begin, end }),
        }
        assert_invariant(
            PERF_TIMER_MONOTONIC,
            end >= begin,
            "End sample not before begin sample",
            Some("record"),
        );

        let total_sec = end - begin;
        let results = PerfResults {
            time_sec: total_sec / num_running as f64,
            total_sec,
            num_running,
            type_of_running: kind,
        };
        info!(
            task = %self.task.name(),
            kind = %kind,
            num_running,
            time_sec = results.time_sec,
            "perf measurement complete"
        );
        Ok(results)
    }
}

fn check_attr(attr: &PerfAttr) -> Result<(), PerfError> {
    if attr.num_running == 0 {
        return Err(PerfError::ZeroRuns);
    }
    Ok(())
}
