//! Data module: the buffer descriptor that binds a caller's memory to a task.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::invariant_ppt::{assert_invariant, OUTPUT_CAPACITY};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Function reference carried through a [`Slot::Function`] slot.
pub type Integrand = fn(&[f64]) -> f64;

/// A descriptor co-owned by the caller and the task bound to it.
pub type SharedTaskData = Arc<RwLock<TaskData>>;

/// The kind of value a slot carries.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Buffer of `f64`.
    F64,
    /// Buffer of `i32`.
    I32,
    /// Single real parameter.
    Scalar,
    /// Single non-negative integer parameter (sizes, iteration counts).
    Count,
    /// Function reference.
    Function,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::F64 => write!(f, "f64[]"),
            SlotKind::I32 => write!(f, "i32[]"),
            SlotKind::Scalar => write!(f, "scalar"),
            SlotKind::Count => write!(f, "count"),
            SlotKind::Function => write!(f, "function"),
        }
    }
}

/// One typed input or output region.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum Slot {
    /// Buffer of `f64` values.
    F64(Vec<f64>),
    /// Buffer of `i32` values.
    I32(Vec<i32>),
    /// Real parameter.
    Scalar(f64),
    /// Integer parameter.
    Count(usize),
    /// Function parameter.
    Function(Integrand),
}

impl Slot {
    /// The kind tag of this slot.
    pub fn kind(&self) -> SlotKind {
        match self {
            Slot::F64(_) => SlotKind::F64,
            Slot::I32(_) => SlotKind::I32,
            Slot::Scalar(_) => SlotKind::Scalar,
            Slot::Count(_) => SlotKind::Count,
            Slot::Function(_) => SlotKind::Function,
        }
    }

    /// Element count. Buffers report their length, everything else counts as one.
    pub fn len(&self) -> usize {
        match self {
            Slot::F64(values) => values.len(),
            Slot::I32(values) => values.len(),
            Slot::Scalar(_) | Slot::Count(_) | Slot::Function(_) => 1,
        }
    }

    /// True for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<f64>> for Slot {
    fn from(values: Vec<f64>) -> Self {
        Slot::F64(values)
    }
}

impl From<Vec<i32>> for Slot {
    fn from(values: Vec<i32>) -> Self {
        Slot::I32(values)
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f64 {}
    impl Sealed for i32 {}
}

/// Element types that can live in a buffer slot.
pub trait Element: Copy + Default + sealed::Sealed + 'static {
    /// Slot kind holding buffers of this element.
    const KIND: SlotKind;
    /// Borrow the buffer if the slot has this element type.
    fn view(slot: &Slot) -> Option<&[Self]>;
    /// Mutably borrow the buffer if the slot has this element type.
    fn view_mut(slot: &mut Slot) -> Option<&mut [Self]>;
    /// Allocate a zeroed buffer slot.
    fn zeroed(len: usize) -> Slot;
}

impl Element for f64 {
    const KIND: SlotKind = SlotKind::F64;

    fn view(slot: &Slot) -> Option<&[Self]> {
        match slot {
            Slot::F64(values) => Some(values),
            _ => None,
        }
    }

    fn view_mut(slot: &mut Slot) -> Option<&mut [Self]> {
        match slot {
            Slot::F64(values) => Some(values),
            _ => None,
        }
    }

    fn zeroed(len: usize) -> Slot {
        Slot::F64(vec![0.0; len])
    }
}

impl Element for i32 {
    const KIND: SlotKind = SlotKind::I32;

    fn view(slot: &Slot) -> Option<&[Self]> {
        match slot {
            Slot::I32(values) => Some(values),
            _ => None,
        }
    }

    fn view_mut(slot: &mut Slot) -> Option<&mut [Self]> {
        match slot {
            Slot::I32(values) => Some(values),
            _ => None,
        }
    }

    fn zeroed(len: usize) -> Slot {
        Slot::I32(vec![0; len])
    }
}

/// Errors raised when a slot is accessed with the wrong index, kind or size.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    /// No input at this index.
    #[error("no input slot at index {index}")]
    MissingInput {
        /// Requested index.
        index: usize,
    },
    /// No output at this index.
    #[error("no output slot at index {index}")]
    MissingOutput {
        /// Requested index.
        index: usize,
    },
    /// Slot exists but holds another kind.
    #[error("slot {index} holds {found}, expected {expected}")]
    KindMismatch {
        /// Slot index.
        index: usize,
        /// Kind the caller asked for.
        expected: SlotKind,
        /// Kind actually stored.
        found: SlotKind,
    },
    /// Write or resize beyond the caller's pre-sized capacity.
    #[error("output {index} has capacity {capacity}, {requested} elements requested")]
    CapacityExceeded {
        /// Output index.
        index: usize,
        /// Allocated capacity.
        capacity: usize,
        /// Requested length.
        requested: usize,
    },
}

/// Buffer-list descriptor: typed inputs, pre-sized outputs and their actual sizes.
///
/// Outputs are allocated by the caller. Their allocated length is the
/// capacity; `outputs_count` holds how much of it is meaningful and only
/// changes through [`TaskData::write_output`] and [`TaskData::set_output_len`].
#[derive(Debug, Clone, Default)]
pub struct TaskData {
    inputs: Vec<Slot>,
    outputs: Vec<Slot>,
    outputs_count: Vec<usize>,
}

impl TaskData {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input slot; returns its index.
    pub fn push_input(&mut self, slot: Slot) -> usize {
        self.inputs.push(slot);
        self.inputs.len() - 1
    }

    /// Append an output slot whose current length becomes its capacity.
    pub fn push_output(&mut self, slot: Slot) -> usize {
        self.outputs_count.push(slot.len());
        self.outputs.push(slot);
        self.outputs.len() - 1
    }

    /// Wrap into a shared handle.
    pub fn shared(self) -> SharedTaskData {
        Arc::new(RwLock::new(self))
    }

    /// All input slots, in positional order.
    pub fn inputs(&self) -> &[Slot] {
        &self.inputs
    }

    /// All output slots, in positional order.
    pub fn outputs(&self) -> &[Slot] {
        &self.outputs
    }

    /// Element count of every input.
    pub fn inputs_count(&self) -> Vec<usize> {
        self.inputs.iter().map(Slot::len).collect()
    }

    /// Actual size of every output.
    pub fn outputs_count(&self) -> &[usize] {
        &self.outputs_count
    }

    /// Borrow one input slot.
    pub fn input(&self, index: usize) -> Result<&Slot, DataError> {
        self.inputs
            .get(index)
            .ok_or(DataError::MissingInput { index })
    }

    /// Borrow one output slot.
    pub fn output(&self, index: usize) -> Result<&Slot, DataError> {
        self.outputs
            .get(index)
            .ok_or(DataError::MissingOutput { index })
    }

    /// Borrow an input buffer as a typed slice.
    pub fn input_slice<T: Element>(&self, index: usize) -> Result<&[T], DataError> {
        let slot = self.input(index)?;
        T::view(slot).ok_or(DataError::KindMismatch {
            index,
            expected: T::KIND,
            found: slot.kind(),
        })
    }

    /// Read a [`Slot::Count`] input.
    pub fn input_count(&self, index: usize) -> Result<usize, DataError> {
        match self.input(index)? {
            Slot::Count(value) => Ok(*value),
            other => Err(DataError::KindMismatch {
                index,
                expected: SlotKind::Count,
                found: other.kind(),
            }),
        }
    }

    /// Read a [`Slot::Scalar`] input.
    pub fn input_scalar(&self, index: usize) -> Result<f64, DataError> {
        match self.input(index)? {
            Slot::Scalar(value) => Ok(*value),
            other => Err(DataError::KindMismatch {
                index,
                expected: SlotKind::Scalar,
                found: other.kind(),
            }),
        }
    }

    /// Read a [`Slot::Function`] input.
    pub fn input_function(&self, index: usize) -> Result<Integrand, DataError> {
        match self.input(index)? {
            Slot::Function(f) => Ok(*f),
            other => Err(DataError::KindMismatch {
                index,
                expected: SlotKind::Function,
                found: other.kind(),
            }),
        }
    }

    /// Allocated capacity of an output.
    pub fn output_capacity(&self, index: usize) -> Result<usize, DataError> {
        self.output(index).map(Slot::len)
    }

    /// The meaningful prefix of an output buffer.
    pub fn output_slice<T: Element>(&self, index: usize) -> Result<&[T], DataError> {
        let slot = self.output(index)?;
        let values = T::view(slot).ok_or(DataError::KindMismatch {
            index,
            expected: T::KIND,
            found: slot.kind(),
        })?;
        Ok(&values[..self.outputs_count[index]])
    }

    /// Copy `values` into the front of an output and record its new size.
    pub fn write_output<T: Element>(&mut self, index: usize, values: &[T]) -> Result<(), DataError> {
        let slot = self
            .outputs
            .get_mut(index)
            .ok_or(DataError::MissingOutput { index })?;
        let found = slot.kind();
        let buffer = T::view_mut(slot).ok_or(DataError::KindMismatch {
            index,
            expected: T::KIND,
            found,
        })?;
        if values.len() > buffer.len() {
            return Err(DataError::CapacityExceeded {
                index,
                capacity: buffer.len(),
                requested: values.len(),
            });
        }
        buffer[..values.len()].copy_from_slice(values);
        self.outputs_count[index] = values.len();
        assert_invariant(
            OUTPUT_CAPACITY,
            self.outputs_count[index] <= self.outputs[index].len(),
            "Output size stays within capacity",
            Some("write_output"),
        );
        Ok(())
    }

    /// Change the recorded size of an output without touching its contents.
    pub fn set_output_len(&mut self, index: usize, len: usize) -> Result<(), DataError> {
        let capacity = self.output_capacity(index)?;
        if len > capacity {
            return Err(DataError::CapacityExceeded {
                index,
                capacity,
                requested: len,
            });
        }
        self.outputs_count[index] = len;
        Ok(())
    }
}
