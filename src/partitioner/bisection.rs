use super::{Partitioner, TaskSlice};
use crate::group::ProcessGroup;
use crate::partitioning::Partitioning;
use crate::range::{IndexSpace, Range};

/// Recursive median-cut partitioner: repeatedly halves the process group and
/// the current sub-range along its currently-widest dimension, until each
/// leaf holds exactly one process.
///
/// Generalizes naturally to 1, 2 or 3 dimensions since the cut dimension is
/// chosen by current extent rather than fixed up front.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bisection;

impl Partitioner for Bisection {
    fn run(
        &self,
        space: &IndexSpace,
        group: &ProcessGroup,
        _base: Option<&Partitioning>,
    ) -> Vec<TaskSlice> {
        let mut slices = Vec::with_capacity(group.size());
        recurse(space.full_range(), 0, group.size(), &mut slices);
        slices.sort_by_key(|s| s.process);
        slices
    }

    fn algorithm_name(&self) -> &'static str {
        "bisection"
    }
}

fn recurse(range: Range, first_process: usize, n: usize, out: &mut Vec<TaskSlice>) {
    if n == 1 {
        let process = i32::try_from(first_process).unwrap_or(0);
        out.push(TaskSlice {
            process,
            range,
            tag: u32::try_from(process).unwrap_or(0),
            map_no: 0,
        });
        return;
    }

    let dim = widest_dim(&range);
    let left_n = n / 2;
    let right_n = n - left_n;
    let width = range.width(dim);
    let split = (width * i64::try_from(left_n).unwrap_or(1)) / i64::try_from(n).unwrap_or(1);

    let mut left_to = range.to().to_vec();
    left_to[dim] = range.from()[dim] + split;
    let left = Range::new(range.from(), &left_to);

    let mut right_from = range.from().to_vec();
    right_from[dim] = range.from()[dim] + split;
    let right = Range::new(&right_from, range.to());

    recurse(left, first_process, left_n, out);
    recurse(right, first_process + left_n, right_n, out);
}

fn widest_dim(range: &Range) -> usize {
    (0..range.dims())
        .max_by_key(|&d| range.width(d))
        .unwrap_or(0)
}
