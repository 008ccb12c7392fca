//! Partitioner algorithms (component C): pure functions from `(group,
//! space, optional base partitioning)` to a set of `(process, range)`
//! assignments.
//!
//! Each algorithm is a small config struct implementing [`Partitioner`],
//! mirroring the teacher's capability-flagged [`DynOp`](crate::node)
//! trait — a narrow required method (`run`) plus optional methods with
//! sensible defaults (`overlap_policy`) that callers (the planner, the
//! reservation builder) use to reason about the result without matching on
//! a concrete type.

mod bisection;
mod block;
mod halo;
mod reassign;
mod simple;

pub use bisection::Bisection;
pub use block::{Block, BlockElementWeighted, BlockTaskWeighted};
pub use halo::Halo;
pub use reassign::Reassign;
pub use simple::{All, Master, Single};

use crate::group::ProcessGroup;
use crate::partitioning::Partitioning;
use crate::range::{IndexSpace, Range};
use serde::{Deserialize, Serialize};

/// One assignment of one range to one process within a partitioning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSlice {
    pub process: i32,
    pub range: Range,
    /// Groups slices (within and across partitionings) that must share a
    /// backing mapping, so memory stays contiguous across a re-partitioning
    /// (e.g. a halo partitioning reuses its base's tag).
    pub tag: u32,
    /// Distinguishes multiple slices belonging to the same process within
    /// one partitioning (e.g. a cycled block distribution).
    pub map_no: u32,
}

/// Whether a partitioner's output task-slices may overlap across processes.
///
/// This is a property of the algorithm, not of the materialized
/// [`Partitioning`] (spec §3: "Overlap policy is a property of the
/// partitioner, not of the partitioning object").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlapPolicy {
    Exclusive,
    Overlapping,
}

/// A pure algorithm producing a partitioning.
pub trait Partitioner {
    /// Compute task-slices for `space` over `group`, optionally given a
    /// `base` partitioning (halo, reassign).
    fn run(
        &self,
        space: &IndexSpace,
        group: &ProcessGroup,
        base: Option<&Partitioning>,
    ) -> Vec<TaskSlice>;

    /// Whether this algorithm's output task-slices may overlap.
    fn overlap_policy(&self) -> OverlapPolicy {
        OverlapPolicy::Exclusive
    }

    /// Human-readable algorithm name, used for logging and `Display`-style
    /// debugging of a materialized [`Partitioning`].
    fn algorithm_name(&self) -> &'static str;
}

/// Tie-break used everywhere in this module: lower process id wins, lower
/// starting index wins. Equivalent to [`Range`]'s `Ord` impl plus a process
/// id comparison, exposed as a free function so each partitioner doesn't
/// need to re-derive it.
pub(crate) fn tie_break_cmp(a: (i32, Range), b: (i32, Range)) -> std::cmp::Ordering {
    a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1))
}
