//! Integer sort: LSD radix sort, chunked radix sort with merge, or rayon's parallel sort.

use super::{chunk_len, scoped_chunks, Backend};
use crate::data::{SlotKind, TaskData};
use crate::schema::Schema;
use crate::task::TaskImpl;
use rayon::prelude::*;

const SIGN_BIT: u32 = 0x8000_0000;

/// Sorts `inputs[0]` ascending into `outputs[0]`. Both must hold the same number of elements.
#[derive(Debug, Clone)]
pub struct SortTask {
    backend: Backend,
    name: String,
    values: Vec<i32>,
}

impl SortTask {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            name: backend.task_name("sort"),
            values: Vec::new(),
        }
    }
}

impl TaskImpl for SortTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<Schema> {
        Some(Schema::new([SlotKind::I32], [SlotKind::I32]))
    }

    fn validation(&mut self, data: &TaskData) -> bool {
        let counts = (data.inputs_count().first().copied(), data.outputs_count().first().copied());
        self.backend.is_valid() && matches!(counts, (Some(input), Some(output)) if input == output)
    }

    fn pre_processing(&mut self, data: &TaskData) -> bool {
        if let Ok(values) = data.input_slice::<i32>(0) {
            self.values = values.to_vec();
            true
        } else {
            false
        }
    }

    fn run(&mut self) -> bool {
        match self.backend {
            Backend::Seq => {
                radix_sort(&mut self.values);
                true
            }
            Backend::Threads(workers) => {
                let run = chunk_len(self.values.len(), workers);
                if !scoped_chunks(&mut self.values, run, |_, chunk| radix_sort(chunk)) {
                    return false;
                }
                merge_runs(&mut self.values, run);
                true
            }
            Backend::Rayon => {
                self.values.par_sort_unstable();
                true
            }
        }
    }

    fn post_processing(&mut self, data: &mut TaskData) -> bool {
        data.write_output(0, &self.values).is_ok()
    }
}

/// Least-significant-digit radix sort, one byte per pass.
pub fn radix_sort(values: &mut [i32]) {
    let mut keys: Vec<u32> = values.iter().map(|&v| (v as u32) ^ SIGN_BIT).collect();
    let mut scratch = vec![0u32; keys.len()];
    for shift in (0..32).step_by(8) {
        let mut offsets = [0usize; 256];
        for &key in &keys {
            offsets[((key >> shift) & 0xFF) as usize] += 1;
        }
        let mut total = 0;
        for slot in offsets.iter_mut() {
            let count = *slot;
            *slot = total;
            total += count;
        }
        for &key in &keys {
            let digit = ((key >> shift) & 0xFF) as usize;
            scratch[offsets[digit]] = key;
            offsets[digit] += 1;
        }
        std::mem::swap(&mut keys, &mut scratch);
    }
    for (value, key) in values.iter_mut().zip(keys) {
        *value = (key ^ SIGN_BIT) as i32;
    }
}

/// Bottom-up merge of consecutive sorted runs of length `run`.
fn merge_runs(values: &mut Vec<i32>, run: usize) {
    let len = values.len();
    let mut buffer = vec![0; len];
    let mut width = run.max(1);
    while width < len {
        for start in (0..len).step_by(2 * width) {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            merge(&values[start..mid], &values[mid..end], &mut buffer[start..end]);
        }
        std::mem::swap(values, &mut buffer);
        width *= 2;
    }
}

fn merge(left: &[i32], right: &[i32], out: &mut [i32]) {
    let (mut i, mut j) = (0, 0);
    for slot in out.iter_mut() {
        if j >= right.len() || (i < left.len() && left[i] <= right[j]) {
            *slot = left[i];
            i += 1;
        } else {
            *slot = right[j];
            j += 1;
        }
    }
}
