//! Planar convex hull (monotone chain).

use super::Backend;
use crate::data::{SlotKind, TaskData};
use crate::schema::Schema;
use crate::task::TaskImpl;
use rayon::prelude::*;
use std::cmp::Ordering;

type Point = (f64, f64);

/// Convex hull of interleaved `x, y` coordinates.
///
/// The output buffer must be at least as long as the input; after
/// post-processing its size is twice the number of hull vertices. Vertices
/// run counter-clockwise from the leftmost point (lowest on ties) and
/// collinear boundary points are dropped.
#[derive(Debug, Clone)]
pub struct HullTask {
    backend: Backend,
    name: String,
    points: Vec<Point>,
    hull: Vec<Point>,
}

impl HullTask {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            name: backend.task_name("hull"),
            points: Vec::new(),
            hull: Vec::new(),
        }
    }
}

fn lexicographic(a: &Point, b: &Point) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
}

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Monotone chain over points already sorted lexicographically.
pub fn monotone_chain(sorted: &[Point]) -> Vec<Point> {
    if sorted.len() < 3 {
        return sorted.to_vec();
    }
    let mut hull: Vec<Point> = Vec::with_capacity(2 * sorted.len());
    for &p in sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    // Last point repeats the first.
    hull.pop();
    hull
}

impl TaskImpl for HullTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<Schema> {
        Some(Schema::new([SlotKind::F64], [SlotKind::F64]))
    }

    fn validation(&mut self, data: &TaskData) -> bool {
        if matches!(self.backend, Backend::Threads(_)) {
            return false;
        }
        match (data.input(0), data.output_capacity(0)) {
            (Ok(input), Ok(capacity)) => {
                let len = input.len();
                len % 2 == 0 && len >= 6 && capacity >= len
            }
            _ => false,
        }
    }

    fn pre_processing(&mut self, data: &TaskData) -> bool {
        let Ok(coords) = data.input_slice::<f64>(0) else {
            return false;
        };
        if coords.iter().any(|c| !c.is_finite()) {
            return false;
        }
        self.points = coords.chunks_exact(2).map(|xy| (xy[0], xy[1])).collect();
        self.hull.clear();
        true
    }

    fn run(&mut self) -> bool {
        match self.backend {
            Backend::Seq => self.points.sort_unstable_by(lexicographic),
            Backend::Rayon => self.points.par_sort_unstable_by(lexicographic),
            Backend::Threads(_) => return false,
        }
        self.points.dedup();
        self.hull = monotone_chain(&self.points);
        true
    }

    fn post_processing(&mut self, data: &mut TaskData) -> bool {
        let coords: Vec<f64> = self.hull.iter().flat_map(|&(x, y)| [x, y]).collect();
        data.write_output(0, &coords).is_ok()
    }
}
