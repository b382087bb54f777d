//! Monte Carlo integration over an axis-aligned box.

use super::Backend;
use crate::data::{Integrand, SlotKind, TaskData};
use crate::schema::Schema;
use crate::task::TaskImpl;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Estimates `∫ f` over `[lower, upper]` with uniform samples.
///
/// Sequential runs draw from one owned generator. Parallel runs give chunk
/// `i` its own ChaCha stream `i` under the same seed, so results depend on
/// the seed and the chunk layout only.
#[derive(Debug, Clone)]
pub struct MonteCarloTask {
    backend: Backend,
    name: String,
    seed: u64,
    rng: ChaCha8Rng,
    lower: Vec<f64>,
    upper: Vec<f64>,
    samples: usize,
    f: Option<Integrand>,
    estimate: f64,
}

impl MonteCarloTask {
    pub fn new(backend: Backend, seed: u64) -> Self {
        Self {
            backend,
            name: backend.task_name("montecarlo"),
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            lower: Vec::new(),
            upper: Vec::new(),
            samples: 0,
            f: None,
            estimate: 0.0,
        }
    }

    fn volume(&self) -> f64 {
        self.lower.iter().zip(&self.upper).map(|(lo, hi)| hi - lo).product()
    }

    fn stream(&self, index: usize) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(index as u64);
        rng
    }

    /// Samples handled by chunk `index` out of `chunks`.
    fn share(&self, index: usize, chunks: usize) -> usize {
        self.samples / chunks + usize::from(index < self.samples % chunks)
    }
}

fn sample_sum(rng: &mut ChaCha8Rng, f: Integrand, lower: &[f64], upper: &[f64], count: usize) -> f64 {
    let mut point = vec![0.0; lower.len()];
    let mut sum = 0.0;
    for _ in 0..count {
        for ((x, &lo), &hi) in point.iter_mut().zip(lower).zip(upper) {
            *x = rng.gen_range(lo..=hi);
        }
        sum += f(&point);
    }
    sum
}

impl TaskImpl for MonteCarloTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<Schema> {
        Some(Schema::new(
            [SlotKind::F64, SlotKind::F64, SlotKind::Count, SlotKind::Function],
            [SlotKind::F64],
        ))
    }

    fn validation(&mut self, data: &TaskData) -> bool {
        let bounds = (data.input(0), data.input(1), data.output_capacity(0));
        self.backend.is_valid()
            && matches!(bounds, (Ok(lo), Ok(hi), Ok(1)) if !lo.is_empty() && lo.len() == hi.len())
    }

    fn pre_processing(&mut self, data: &TaskData) -> bool {
        let (Ok(lower), Ok(upper), Ok(samples), Ok(f)) = (
            data.input_slice::<f64>(0),
            data.input_slice::<f64>(1),
            data.input_count(2),
            data.input_function(3),
        ) else {
            return false;
        };
        // Uniform sampling needs every width `hi - lo` to be representable.
        let ordered = lower
            .iter()
            .zip(upper)
            .all(|(lo, hi)| lo <= hi && (hi - lo).is_finite());
        if samples == 0 || !ordered {
            return false;
        }
        self.lower = lower.to_vec();
        self.upper = upper.to_vec();
        if !self.volume().is_finite() {
            return false;
        }
        self.samples = samples;
        self.f = Some(f);
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        true
    }

    fn run(&mut self) -> bool {
        let Some(f) = self.f else {
            return false;
        };
        let sum = match self.backend {
            Backend::Seq => sample_sum(&mut self.rng, f, &self.lower, &self.upper, self.samples),
            Backend::Threads(workers) => {
                let this = &*self;
                let partials = std::thread::scope(|s| {
                    let handles: Vec<_> = (0..workers)
                        .map(|index| {
                            s.spawn(move || {
                                let count = this.share(index, workers);
                                sample_sum(&mut this.stream(index), f, &this.lower, &this.upper, count)
                            })
                        })
                        .collect();
                    handles
                        .into_iter()
                        .map(|handle| handle.join())
                        .collect::<Vec<_>>()
                });
                let mut sum = 0.0;
                for partial in partials {
                    match partial {
                        Ok(value) => sum += value,
                        Err(_) => return false,
                    }
                }
                sum
            }
            Backend::Rayon => {
                let chunks = rayon::current_num_threads().max(1);
                let this = &*self;
                (0..chunks)
                    .into_par_iter()
                    .map(|index| {
                        let count = this.share(index, chunks);
                        sample_sum(&mut this.stream(index), f, &this.lower, &this.upper, count)
                    })
                    .sum::<f64>()
            }
        };
        self.estimate = self.volume() * sum / self.samples as f64;
        true
    }

    fn post_processing(&mut self, data: &mut TaskData) -> bool {
        data.write_output(0, &[self.estimate]).is_ok()
    }
}
