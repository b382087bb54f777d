//! Dense row-major matrix product `C = A * B`.

use super::{chunk_len, scoped_chunks, Backend};
use crate::data::{DataError, SlotKind, TaskData};
use crate::schema::Schema;
use crate::task::TaskImpl;
use rayon::prelude::*;

/// Multiplies an `m x k` matrix by a `k x n` matrix.
///
/// Inputs: `A`, `B`, then the counts `m`, `k`, `n`. The single output must
/// hold exactly `m * n` values.
#[derive(Debug, Clone)]
pub struct MatMulTask {
    backend: Backend,
    name: String,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    dims: (usize, usize, usize),
}

impl MatMulTask {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            name: backend.task_name("matmul"),
            a: Vec::new(),
            b: Vec::new(),
            c: Vec::new(),
            dims: (0, 0, 0),
        }
    }
}

fn dims(data: &TaskData) -> Result<(usize, usize, usize), DataError> {
    Ok((data.input_count(2)?, data.input_count(3)?, data.input_count(4)?))
}

fn shapes_agree(data: &TaskData) -> Result<bool, DataError> {
    let (m, k, n) = dims(data)?;
    if m == 0 || k == 0 || n == 0 {
        return Ok(false);
    }
    // Dimensions whose products overflow cannot describe any real buffer.
    let (Some(a_len), Some(b_len), Some(c_len)) =
        (m.checked_mul(k), k.checked_mul(n), m.checked_mul(n))
    else {
        return Ok(false);
    };
    Ok(data.input(0)?.len() == a_len
        && data.input(1)?.len() == b_len
        && data.output_capacity(0)? == c_len)
}

/// Fill `out` (whole rows of C, starting at `first_row`) from `a` and `b`.
fn multiply_rows(a: &[f64], b: &[f64], k: usize, n: usize, first_row: usize, out: &mut [f64]) {
    for (offset, row) in out.chunks_mut(n).enumerate() {
        let i = first_row + offset;
        row.fill(0.0);
        for p in 0..k {
            let aip = a[i * k + p];
            for (cij, bpj) in row.iter_mut().zip(&b[p * n..(p + 1) * n]) {
                *cij += aip * bpj;
            }
        }
    }
}

impl TaskImpl for MatMulTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<Schema> {
        Some(Schema::new(
            [
                SlotKind::F64,
                SlotKind::F64,
                SlotKind::Count,
                SlotKind::Count,
                SlotKind::Count,
            ],
            [SlotKind::F64],
        ))
    }

    fn validation(&mut self, data: &TaskData) -> bool {
        self.backend.is_valid() && shapes_agree(data).unwrap_or(false)
    }

    fn pre_processing(&mut self, data: &TaskData) -> bool {
        let Ok((m, k, n)) = dims(data) else {
            return false;
        };
        let (Ok(a), Ok(b)) = (data.input_slice::<f64>(0), data.input_slice::<f64>(1)) else {
            return false;
        };
        self.a = a.to_vec();
        self.b = b.to_vec();
        self.c = vec![0.0; m * n];
        self.dims = (m, k, n);
        true
    }

    fn run(&mut self) -> bool {
        let (m, k, n) = self.dims;
        let (a, b) = (&self.a, &self.b);
        match self.backend {
            Backend::Seq => {
                multiply_rows(a, b, k, n, 0, &mut self.c);
                true
            }
            Backend::Threads(workers) => {
                let rows = chunk_len(m, workers);
                scoped_chunks(&mut self.c, rows * n, |index, block| {
                    multiply_rows(a, b, k, n, index * rows, block)
                })
            }
            Backend::Rayon => {
                self.c
                    .par_chunks_mut(n.max(1))
                    .enumerate()
                    .for_each(|(i, row)| multiply_rows(a, b, k, n, i, row));
                true
            }
        }
    }

    fn post_processing(&mut self, data: &mut TaskData) -> bool {
        data.write_output(0, &self.c).is_ok()
    }
}
