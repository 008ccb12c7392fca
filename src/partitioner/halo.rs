use super::{OverlapPolicy, Partitioner, TaskSlice};
use crate::group::ProcessGroup;
use crate::partitioning::Partitioning;
use crate::range::IndexSpace;

/// Grows each slice of a `base` partitioning outward by `depth` along every
/// face, clamped to the owning space. Requires a base partitioning (halo is
/// always relative to something) and reuses the base's `tag` per process so
/// a halo-extended container shares mapping lineage with its source (spec
/// §4.F's tag-based memory reuse).
///
/// `corners` controls whether the growth also fills the diagonal corner
/// region (true) or only the axis-aligned faces (false, "plus-shape" halo).
#[derive(Clone, Copy, Debug)]
pub struct Halo {
    pub depth: i64,
    pub corners: bool,
}

impl Halo {
    #[must_use]
    pub const fn new(depth: i64) -> Self {
        Self { depth, corners: true }
    }

    #[must_use]
    pub const fn without_corners(depth: i64) -> Self {
        Self { depth, corners: false }
    }
}

impl Partitioner for Halo {
    fn run(
        &self,
        space: &IndexSpace,
        _group: &ProcessGroup,
        base: Option<&Partitioning>,
    ) -> Vec<TaskSlice> {
        let Some(base) = base else {
            // No base to grow from: an empty base partition halos to empty
            // (spec §9, Open Question resolved in DESIGN.md).
            return Vec::new();
        };
        let bound = space.full_range();
        let mut out = Vec::new();
        for slice in base.slices() {
            let grown = slice.range.extended(self.depth, &bound);
            if self.corners {
                out.push(TaskSlice {
                    process: slice.process,
                    range: grown,
                    tag: slice.tag,
                    map_no: slice.map_no,
                });
            } else {
                // Without corners: emit the axis-aligned grown range but
                // intersected back with the original range extended one
                // dimension at a time, unioned. We approximate the
                // plus-shape by emitting one grown slice per dimension,
                // each extended only along that axis.
                for d in 0..grown.dims() {
                    let mut from = slice.range.from().to_vec();
                    let mut to = slice.range.to().to_vec();
                    from[d] = grown.from()[d];
                    to[d] = grown.to()[d];
                    let arm = crate::range::Range::new(&from, &to);
                    out.push(TaskSlice {
                        process: slice.process,
                        range: arm,
                        tag: slice.tag,
                        map_no: slice.map_no,
                    });
                }
            }
        }
        out
    }

    fn overlap_policy(&self) -> OverlapPolicy {
        OverlapPolicy::Overlapping
    }

    fn algorithm_name(&self) -> &'static str {
        "halo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitioner::Block;
    use crate::partitioning::Partitioning;

    #[test]
    fn halo_with_no_base_is_empty() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(2, 0);
        let slices = Halo::new(1).run(&space, &group, None);
        assert!(slices.is_empty());
    }

    #[test]
    fn halo_grows_and_clamps() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(2, 0);
        let base = Partitioning::build("base", &space, &group, &Block::new(0), None);
        let grown = Halo::new(2).run(&space, &group, Some(&base));
        assert_eq!(grown.len(), 2);
        assert_eq!(grown[0].range.from()[0], 0);
    }

    #[test]
    fn halo_without_corners_yields_per_axis_arms() {
        let space = IndexSpace::new("s", &[10, 10]).unwrap();
        let group = ProcessGroup::world(2, 0);
        let base = Partitioning::build("base", &space, &group, &Block::new(0), None);
        let grown = Halo::without_corners(1).run(&space, &group, Some(&base));
        assert_eq!(grown.len(), base.slices().len() * 2);
    }
}
