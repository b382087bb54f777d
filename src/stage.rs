//! Lifecycle stage definitions for tasks.
//!
//! ```text
//! Created       --validation-->      Validated | Rejected
//! PostProcessed --validation-->      Validated | Rejected
//! Validated     --pre_processing-->  PreProcessed | Failed
//! PreProcessed  --run-->             RunDone | Failed
//! RunDone       --run-->             RunDone | Failed
//! RunDone       --post_processing--> PostProcessed | Failed
//! ```
//!
//! `Rejected` and `Failed` are terminal.

use std::fmt;

/// Where a task stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Bound to its descriptor, nothing called yet.
    Created,
    /// Validation succeeded.
    Validated,
    /// Inputs decoded into the plugin's working state.
    PreProcessed,
    /// At least one run completed.
    RunDone,
    /// Results written back; a new logical run may start.
    PostProcessed,
    /// Validation failed (terminal).
    Rejected,
    /// A later step failed or panicked (terminal).
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Validated => write!(f, "validated"),
            Self::PreProcessed => write!(f, "pre_processed"),
            Self::RunDone => write!(f, "run_done"),
            Self::PostProcessed => write!(f, "post_processed"),
            Self::Rejected => write!(f, "rejected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One of the four lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Validation,
    PreProcessing,
    Run,
    PostProcessing,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Step {
    /// Name of the step as used in logs and statistics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::PreProcessing => "pre_processing",
            Self::Run => "run",
            Self::PostProcessing => "post_processing",
        }
    }

    /// Stage reached when this step succeeds.
    pub fn target(self) -> Stage {
        match self {
            Self::Validation => Stage::Validated,
            Self::PreProcessing => Stage::PreProcessed,
            Self::Run => Stage::RunDone,
            Self::PostProcessing => Stage::PostProcessed,
        }
    }

    /// Stage reached when this step fails.
    pub fn failure(self) -> Stage {
        match self {
            Self::Validation => Stage::Rejected,
            _ => Stage::Failed,
        }
    }
}

impl Stage {
    /// Returns `true` if no further step is accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Failed)
    }

    /// Returns `true` if `step` may be called from this stage.
    pub fn accepts(&self, step: Step) -> bool {
        match step {
            Step::Validation => matches!(self, Self::Created | Self::PostProcessed),
            Step::PreProcessing => matches!(self, Self::Validated),
            Step::Run => matches!(self, Self::PreProcessed | Self::RunDone),
            Step::PostProcessing => matches!(self, Self::RunDone),
        }
    }

    /// The step a well-behaved caller would issue next.
    pub fn expected_step(&self) -> Option<Step> {
        match self {
            Self::Created | Self::PostProcessed => Some(Step::Validation),
            Self::Validated => Some(Step::PreProcessing),
            Self::PreProcessed => Some(Step::Run),
            Self::RunDone => Some(Step::PostProcessing),
            Self::Rejected | Self::Failed => None,
        }
    }
}

/// How a task is being exercised. Perf mode disables the functional time limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestingMode {
    #[default]
    Functional,
    Perf,
}
