use super::{OverlapPolicy, Partitioner, TaskSlice};
use crate::group::ProcessGroup;
use crate::partitioning::Partitioning;
use crate::range::IndexSpace;

/// Every process receives the whole space as one task-slice.
#[derive(Clone, Copy, Debug, Default)]
pub struct All;

impl Partitioner for All {
    fn run(
        &self,
        space: &IndexSpace,
        group: &ProcessGroup,
        _base: Option<&Partitioning>,
    ) -> Vec<TaskSlice> {
        let full = space.full_range();
        (0..group.size())
            .map(|p| TaskSlice {
                process: i32::try_from(p).unwrap_or(i32::MAX),
                range: full,
                tag: u32::try_from(p).unwrap_or(u32::MAX),
                map_no: 0,
            })
            .collect()
    }

    fn overlap_policy(&self) -> OverlapPolicy {
        OverlapPolicy::Overlapping
    }

    fn algorithm_name(&self) -> &'static str {
        "all"
    }
}

/// Process 0 receives the whole space; every other process is empty.
#[derive(Clone, Copy, Debug, Default)]
pub struct Master;

impl Partitioner for Master {
    fn run(
        &self,
        space: &IndexSpace,
        _group: &ProcessGroup,
        _base: Option<&Partitioning>,
    ) -> Vec<TaskSlice> {
        vec![TaskSlice {
            process: 0,
            range: space.full_range(),
            tag: 0,
            map_no: 0,
        }]
    }

    fn algorithm_name(&self) -> &'static str {
        "master"
    }
}

/// A single designated process receives the whole space.
#[derive(Clone, Copy, Debug)]
pub struct Single(pub i32);

impl Partitioner for Single {
    fn run(
        &self,
        space: &IndexSpace,
        _group: &ProcessGroup,
        _base: Option<&Partitioning>,
    ) -> Vec<TaskSlice> {
        vec![TaskSlice {
            process: self.0,
            range: space.full_range(),
            tag: u32::try_from(self.0).unwrap_or(0),
            map_no: 0,
        }]
    }

    fn algorithm_name(&self) -> &'static str {
        "single"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_covers_every_process() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(3, 0);
        let slices = All.run(&space, &group, None);
        assert_eq!(slices.len(), 3);
        assert!(slices.iter().all(|s| s.range == space.full_range()));
    }

    #[test]
    fn master_is_only_process_zero() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(3, 0);
        let slices = Master.run(&space, &group, None);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].process, 0);
    }

    #[test]
    fn single_picks_given_process() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(3, 0);
        let slices = Single(2).run(&space, &group, None);
        assert_eq!(slices[0].process, 2);
    }
}
