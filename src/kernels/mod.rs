//! Reference plugins: small kernels that exercise the task contract on several back-ends.
//!
//! | Plugin | Inputs | Outputs |
//! |---|---|---|
//! | [`SortTask`] | `I32 values` | `I32`, capacity = input length |
//! | [`MatMulTask`] | `F64 A, F64 B, Count m, Count k, Count n` | `F64`, capacity = m*n |
//! | [`HullTask`] | `F64 interleaved xy` | `F64`, capacity >= input length |
//! | [`MonteCarloTask`] | `F64 lower, F64 upper, Count samples, Function f` | `F64`, capacity 1 |

pub mod hull;
pub mod matmul;
pub mod montecarlo;
pub mod sort;

pub use hull::HullTask;
pub use matmul::MatMulTask;
pub use montecarlo::MonteCarloTask;
pub use sort::SortTask;

/// How a plugin's `run` achieves concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Plain sequential code.
    Seq,
    /// Parallel-for over contiguous chunks on this many scoped threads.
    Threads(usize),
    /// Work stealing on the global rayon pool.
    Rayon,
}

impl Backend {
    /// `Threads(0)` is the only invalid configuration.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Backend::Threads(0))
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Backend::Seq => "seq",
            Backend::Threads(_) => "threads",
            Backend::Rayon => "rayon",
        }
    }

    /// Plugin name such as `sort_rayon`, used in logs and perf statistics.
    pub fn task_name(&self, kernel: &str) -> String {
        format!("{kernel}_{}", self.suffix())
    }
}

/// Chunk length that spreads `len` items over `workers` chunks.
pub(crate) fn chunk_len(len: usize, workers: usize) -> usize {
    len.div_ceil(workers.max(1)).max(1)
}

/// Run `f(chunk_index, chunk)` on every `chunk_len`-sized chunk, one scoped thread each.
///
/// Returns `false` if any worker panicked. Every handle is joined so the
/// scope itself never re-raises a worker panic.
pub(crate) fn scoped_chunks<T, F>(items: &mut [T], chunk_len: usize, f: F) -> bool
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    let f = &f;
    std::thread::scope(|s| {
        let handles: Vec<_> = items
            .chunks_mut(chunk_len.max(1))
            .enumerate()
            .map(|(index, chunk)| s.spawn(move || f(index, chunk)))
            .collect();
        handles
            .into_iter()
            .fold(true, |ok, handle| handle.join().is_ok() && ok)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskImpl;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn chunks_cover_range() {
        let mut items = vec![1usize; 1000];
        let counter = AtomicUsize::new(0);
        let ok = scoped_chunks(&mut items, chunk_len(1000, 4), |_, chunk| {
            counter.fetch_add(chunk.len(), Ordering::Relaxed);
        });
        assert!(ok);
        assert_eq!(counter.load(Ordering::Relaxed), 1000);
    }

    #[test]
    fn empty_input_spawns_nothing() {
        let mut items: Vec<u8> = Vec::new();
        let counter = AtomicUsize::new(0);
        assert!(scoped_chunks(&mut items, chunk_len(0, 8), |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        }));
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn worker_panic_reported() {
        let mut items = vec![0u8; 8];
        let ok = scoped_chunks(&mut items, 2, |index, _| {
            if index == 1 {
                panic!("worker down");
            }
        });
        assert!(!ok);
    }

    #[test]
    fn backend_validity() {
        assert!(Backend::Seq.is_valid());
        assert!(Backend::Threads(3).is_valid());
        assert!(!Backend::Threads(0).is_valid());
        assert_eq!(Backend::Threads(2).task_name("hull"), "hull_threads");
        assert_eq!(SortTask::new(Backend::Rayon).name(), "sort_rayon");
        assert_eq!(MonteCarloTask::new(Backend::Seq, 1).name(), "montecarlo_seq");
    }
}
