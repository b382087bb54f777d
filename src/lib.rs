//! Deterministic task lifecycle and performance-measurement kernel for parallel algorithm plugins.
//!
//! A plugin implements [`TaskImpl`] (validation, pre-processing, run,
//! post-processing). [`Task`] binds it to a [`TaskData`] descriptor and
//! enforces stage order. [`Perf`] times repeated runs, and
//! [`LifecycleHarness`] drives one functional run.
//!
//! ```
//! use parabench::kernels::{Backend, SortTask};
//! use parabench::{LifecycleHarness, TaskDataBuilder};
//!
//! let data = TaskDataBuilder::new()
//!     .input_i32(vec![5, 2, 8, 1])
//!     .output::<i32>(4)
//!     .build();
//! let mut harness = LifecycleHarness::new(SortTask::new(Backend::Seq), data);
//! harness.run_once().unwrap();
//! assert_eq!(harness.data().read().output_slice::<i32>(0).unwrap(), &[1, 2, 5, 8]);
//! ```

pub mod data;
pub mod dsl;
pub mod harness;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod kernels;
pub mod perf;
pub mod schema;
pub mod stage;
pub mod task;

pub use data::{DataError, Element, Integrand, SharedTaskData, Slot, SlotKind, TaskData};
pub use dsl::TaskDataBuilder;
pub use harness::{run_lifecycle, LifecycleHarness};
pub use perf::{Perf, PerfAttr, PerfError, PerfResults, RunKind};
pub use schema::{Schema, SchemaError};
pub use stage::{Stage, Step, TestingMode};
pub use task::{Task, TaskError, TaskImpl};
