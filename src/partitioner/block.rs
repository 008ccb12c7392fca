use super::{tie_break_cmp, Partitioner, TaskSlice};
use crate::group::ProcessGroup;
use crate::partitioning::Partitioning;
use crate::range::{IndexSpace, Range};

/// Splits the space into `group.size()` contiguous, equally-sized blocks
/// along one dimension, cycling through processes in order.
///
/// With `cycles == 1` this is a plain contiguous split; with `cycles > 1`
/// each process receives `cycles` separate slices (cyclic distribution),
/// distinguished by `map_no`.
#[derive(Clone, Copy, Debug)]
pub struct Block {
    pub dim: usize,
    pub cycles: u32,
}

impl Block {
    #[must_use]
    pub const fn new(dim: usize) -> Self {
        Self { dim, cycles: 1 }
    }

    #[must_use]
    pub const fn cycled(dim: usize, cycles: u32) -> Self {
        Self { dim, cycles }
    }
}

impl Partitioner for Block {
    fn run(
        &self,
        space: &IndexSpace,
        group: &ProcessGroup,
        _base: Option<&Partitioning>,
    ) -> Vec<TaskSlice> {
        let full = space.full_range();
        let n = group.size();
        let cycles = self.cycles.max(1) as usize;
        let chunks = n * cycles;
        let total = full.width(self.dim);

        let mut slices = Vec::with_capacity(chunks);
        for chunk in 0..chunks {
            let from = split_point(total, chunks, chunk);
            let to = split_point(total, chunks, chunk + 1);
            if from >= to {
                continue;
            }
            let mut lo = full.from().to_vec();
            let mut hi = full.to().to_vec();
            lo[self.dim] = full.from()[self.dim] + from;
            hi[self.dim] = full.from()[self.dim] + to;
            let process = i32::try_from(chunk % n).unwrap_or(0);
            let map_no = u32::try_from(chunk / n).unwrap_or(0);
            slices.push(TaskSlice {
                process,
                range: Range::new(&lo, &hi),
                tag: u32::try_from(process).unwrap_or(0),
                map_no,
            });
        }
        slices.sort_by(|a, b| tie_break_cmp((a.process, a.range), (b.process, b.range)));
        slices
    }

    fn algorithm_name(&self) -> &'static str {
        "block"
    }
}

/// Divide `total` units into `chunks` pieces as evenly as possible and
/// return the starting offset of piece `chunk` (piece `chunks` is the end).
fn split_point(total: i64, chunks: usize, chunk: usize) -> i64 {
    let chunks = chunks as i64;
    let chunk = chunk as i64;
    (total * chunk) / chunks
}

/// Per-element weights, supplied as a dense array in row-major order over
/// the full space. Splits along `dim` so each process gets as close to an
/// equal share of total weight as possible, without crossing into a
/// weighted-optimal (NP-hard) solution — a greedy running-sum cut, the same
/// approach the halo/bisection partitioners use for their own cuts.
pub struct BlockElementWeighted<'a> {
    pub dim: usize,
    pub weights: &'a [f64],
}

impl<'a> BlockElementWeighted<'a> {
    #[must_use]
    pub const fn new(dim: usize, weights: &'a [f64]) -> Self {
        Self { dim, weights }
    }
}

impl Partitioner for BlockElementWeighted<'_> {
    fn run(
        &self,
        space: &IndexSpace,
        group: &ProcessGroup,
        _base: Option<&Partitioning>,
    ) -> Vec<TaskSlice> {
        let full = space.full_range();
        let n = group.size();
        let len = full.width(self.dim) as usize;
        debug_assert_eq!(self.weights.len(), len);

        let total: f64 = self.weights.iter().sum();
        let target = if n == 0 { 0.0 } else { total / n as f64 };

        let mut slices = Vec::with_capacity(n);
        let mut start = 0usize;
        let mut acc = 0.0;
        let mut process = 0i32;
        for i in 0..len {
            acc += self.weights[i];
            let is_last_process = (process as usize) + 1 == n;
            if !is_last_process && acc >= target * f64::from(process + 1) && i + 1 < len {
                push_slice(&mut slices, &full, self.dim, start, i + 1, process);
                start = i + 1;
                process += 1;
            }
        }
        push_slice(&mut slices, &full, self.dim, start, len, process);
        slices
    }

    fn algorithm_name(&self) -> &'static str {
        "block-element-weighted"
    }
}

/// Weight attached to each *process's prior assignment* rather than each
/// element — used to rebalance a follow-up partitioning of the same space
/// when processes have accumulated uneven per-element cost (e.g. from a
/// previous run's timing). `task_weights[p]` scales how much of the space
/// process `p` should receive relative to the others; element distribution
/// within that share is uniform.
pub struct BlockTaskWeighted<'a> {
    pub dim: usize,
    pub task_weights: &'a [f64],
}

impl<'a> BlockTaskWeighted<'a> {
    #[must_use]
    pub const fn new(dim: usize, task_weights: &'a [f64]) -> Self {
        Self { dim, task_weights }
    }
}

impl Partitioner for BlockTaskWeighted<'_> {
    fn run(
        &self,
        space: &IndexSpace,
        group: &ProcessGroup,
        _base: Option<&Partitioning>,
    ) -> Vec<TaskSlice> {
        let full = space.full_range();
        let n = group.size();
        debug_assert_eq!(self.task_weights.len(), n);
        let total: f64 = self.task_weights.iter().sum();
        let width = full.width(self.dim);

        let mut slices = Vec::with_capacity(n);
        let mut acc = 0.0;
        let mut from = 0i64;
        for p in 0..n {
            acc += self.task_weights[p];
            let to = if p + 1 == n {
                width
            } else {
                ((acc / total) * width as f64).round() as i64
            };
            if from < to {
                let mut lo = full.from().to_vec();
                let mut hi = full.to().to_vec();
                lo[self.dim] = full.from()[self.dim] + from;
                hi[self.dim] = full.from()[self.dim] + to;
                let process = i32::try_from(p).unwrap_or(0);
                slices.push(TaskSlice {
                    process,
                    range: Range::new(&lo, &hi),
                    tag: u32::try_from(process).unwrap_or(0),
                    map_no: 0,
                });
            }
            from = to;
        }
        slices
    }

    fn algorithm_name(&self) -> &'static str {
        "block-task-weighted"
    }
}

fn push_slice(
    slices: &mut Vec<TaskSlice>,
    full: &Range,
    dim: usize,
    from: usize,
    to: usize,
    process: i32,
) {
    if from >= to {
        return;
    }
    let mut lo = full.from().to_vec();
    let mut hi = full.to().to_vec();
    lo[dim] = full.from()[dim] + from as i64;
    hi[dim] = full.from()[dim] + to as i64;
    slices.push(TaskSlice {
        process,
        range: Range::new(&lo, &hi),
        tag: u32::try_from(process).unwrap_or(0),
        map_no: 0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_covers_and_is_disjoint() {
        let space = IndexSpace::new("s", &[1000]).unwrap();
        let group = ProcessGroup::world(4, 0);
        let slices = Block::new(0).run(&space, &group, None);
        assert_eq!(slices.len(), 4);
        let total: u64 = slices.iter().map(|s| s.range.size()).sum();
        assert_eq!(total, 1000);
        for w in slices.windows(2) {
            assert_eq!(w[0].range.to()[0], w[1].range.from()[0]);
        }
    }

    #[test]
    fn block_cycled_gives_each_process_multiple_slices() {
        let space = IndexSpace::new("s", &[100]).unwrap();
        let group = ProcessGroup::world(4, 0);
        let slices = Block::cycled(0, 3).run(&space, &group, None);
        assert_eq!(slices.len(), 12);
        let total: u64 = slices.iter().map(|s| s.range.size()).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn block_element_weighted_covers_full_space() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(3, 0);
        let weights: Vec<f64> = (0..10).map(|i| f64::from(i + 1)).collect();
        let slices = BlockElementWeighted::new(0, &weights).run(&space, &group, None);
        let total: u64 = slices.iter().map(|s| s.range.size()).sum();
        assert_eq!(total, 10);
    }
}
