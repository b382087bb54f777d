//! Schema module: typed declaration of a plugin's positional slot layout.

use crate::data::{Slot, SlotKind, TaskData};
use crate::invariant_ppt::{assert_invariant, SCHEMA_CHECKED};

/// Expected kinds of every input and output, in positional order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub inputs: Vec<SlotKind>,
    pub outputs: Vec<SlotKind>,
}

/// Errors raised when a descriptor does not match a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("expected {expected} inputs, found {found}")]
    InputArity { expected: usize, found: usize },
    #[error("expected {expected} outputs, found {found}")]
    OutputArity { expected: usize, found: usize },
    #[error("input {index} holds {found}, expected {expected}")]
    InputKind {
        index: usize,
        expected: SlotKind,
        found: SlotKind,
    },
    #[error("output {index} holds {found}, expected {expected}")]
    OutputKind {
        index: usize,
        expected: SlotKind,
        found: SlotKind,
    },
}

impl Schema {
    /// Create a schema from input and output kinds.
    pub fn new(inputs: impl Into<Vec<SlotKind>>, outputs: impl Into<Vec<SlotKind>>) -> Self {
        Self {
            inputs: inputs.into(),
            outputs: outputs.into(),
        }
    }

    /// Check slot counts first, then every slot's kind.
    pub fn check(&self, data: &TaskData) -> Result<(), SchemaError> {
        if data.inputs().len() != self.inputs.len() {
            return Err(SchemaError::InputArity {
                expected: self.inputs.len(),
                found: data.inputs().len(),
            });
        }
        if data.outputs().len() != self.outputs.len() {
            return Err(SchemaError::OutputArity {
                expected: self.outputs.len(),
                found: data.outputs().len(),
            });
        }
        for (index, (slot, &expected)) in data.inputs().iter().zip(&self.inputs).enumerate() {
            if slot.kind() != expected {
                return Err(SchemaError::InputKind {
                    index,
                    expected,
                    found: slot.kind(),
                });
            }
        }
        for (index, (slot, &expected)) in data.outputs().iter().zip(&self.outputs).enumerate() {
            if slot.kind() != expected {
                return Err(SchemaError::OutputKind {
                    index,
                    expected,
                    found: slot.kind(),
                });
            }
        }

        assert_invariant(
            SCHEMA_CHECKED,
            self.matches(data),
            "Accepted descriptor has exactly the declared slot kinds",
            Some("check"),
        );
        Ok(())
    }

    /// Whole-layout comparison, without the per-slot diagnosis of [`Schema::check`].
    pub fn matches(&self, data: &TaskData) -> bool {
        data.inputs().iter().map(Slot::kind).eq(self.inputs.iter().copied())
            && data.outputs().iter().map(Slot::kind).eq(self.outputs.iter().copied())
    }
}
