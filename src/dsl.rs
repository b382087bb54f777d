//! DSL module: builder API for task descriptors.

use crate::data::{Element, Integrand, SharedTaskData, Slot, TaskData};

/// The descriptor builder. Slots are positional, in the order they are added.
#[derive(Debug, Default)]
pub struct TaskDataBuilder {
    data: TaskData,
}

impl TaskDataBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add any input slot.
    pub fn input(mut self, slot: Slot) -> Self {
        self.data.push_input(slot);
        self
    }

    /// Add an `f64` buffer input.
    pub fn input_f64(self, values: Vec<f64>) -> Self {
        self.input(Slot::F64(values))
    }

    /// Add an `i32` buffer input.
    pub fn input_i32(self, values: Vec<i32>) -> Self {
        self.input(Slot::I32(values))
    }

    /// Add an integer parameter.
    pub fn input_count(self, value: usize) -> Self {
        self.input(Slot::Count(value))
    }

    /// Add a real parameter.
    pub fn input_scalar(self, value: f64) -> Self {
        self.input(Slot::Scalar(value))
    }

    /// Add a function parameter.
    pub fn input_function(self, f: Integrand) -> Self {
        self.input(Slot::Function(f))
    }

    /// Add a zeroed output buffer with the given capacity.
    pub fn output<T: Element>(mut self, capacity: usize) -> Self {
        self.data.push_output(T::zeroed(capacity));
        self
    }

    /// Build the descriptor.
    pub fn build(self) -> TaskData {
        self.data
    }

    /// Build straight into a shared handle.
    pub fn build_shared(self) -> SharedTaskData {
        self.data.shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SlotKind;

    #[test]
    fn dsl_equivalence() {
        // Build via DSL and manually, check equivalence
        let dsl = TaskDataBuilder::new()
            .input_f64(vec![1.0, 2.0])
            .input_count(2)
            .output::<f64>(2)
            .build();

        let mut manual = TaskData::new();
        manual.push_input(Slot::F64(vec![1.0, 2.0]));
        manual.push_input(Slot::Count(2));
        manual.push_output(Slot::F64(vec![0.0; 2]));

        assert_eq!(dsl.inputs_count(), manual.inputs_count());
        assert_eq!(dsl.outputs_count(), manual.outputs_count());
        let kinds = |d: &TaskData| d.inputs().iter().map(Slot::kind).collect::<Vec<_>>();
        assert_eq!(kinds(&dsl), kinds(&manual));
    }

    #[test]
    fn slots_keep_insertion_order() {
        let data = TaskDataBuilder::new()
            .input(Slot::F64(vec![1.0]))
            .input_scalar(0.5)
            .input_count(3)
            .output::<i32>(2)
            .build();
        let kinds: Vec<_> = data.inputs().iter().map(Slot::kind).collect();
        assert_eq!(kinds, [SlotKind::F64, SlotKind::Scalar, SlotKind::Count]);
        assert_eq!(data.output_capacity(0).unwrap(), 2);
    }
}
