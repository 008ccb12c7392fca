use super::{Partitioner, TaskSlice};
use crate::group::ProcessGroup;
use crate::partitioning::Partitioning;
use crate::range::{IndexSpace, Range};

/// Renumbers a `base` partitioning's slices onto `new_group` via its
/// `from_parent` lineage table, and redistributes any slice whose owning
/// process `new_group` dropped to its neighboring survivors, proportional
/// to `element_weight` (spec §4.C item 9: process-group change preserves
/// partitioning shape, surrendered ranges are rebalanced rather than left
/// uncovered). Used after [`ProcessGroup::shrink`] to cover a faulted
/// process's elements without recomputing the geometry from scratch.
///
/// `element_weight` scores a single global index; a removed process's
/// range is split along the one dimension it shares a face with its
/// surviving neighbors, in proportion to each neighbor's total weight over
/// its own current range. A surrendered slice with no face-adjacent
/// survivor in `base` has nowhere to go and is dropped — a subsequent
/// partitioning would need to cover it.
pub struct Reassign<'a> {
    pub new_group: &'a ProcessGroup,
    pub element_weight: &'a dyn Fn(&[i64]) -> f64,
}

impl<'a> Reassign<'a> {
    #[must_use]
    pub fn new(new_group: &'a ProcessGroup, element_weight: &'a dyn Fn(&[i64]) -> f64) -> Self {
        Self { new_group, element_weight }
    }

    fn redistribute(&self, slice: &TaskSlice, survivors: &[TaskSlice]) -> Vec<TaskSlice> {
        if slice.range.size() == 0 {
            return Vec::new();
        }
        let dims = slice.range.dims();
        let mut neighbors: Vec<&TaskSlice> = Vec::new();
        let mut dim = 0usize;
        for d in 0..dims {
            for nb in survivors {
                if nb.range.dims() != dims {
                    continue;
                }
                let touches = nb.range.from()[d] == slice.range.to()[d]
                    || nb.range.to()[d] == slice.range.from()[d];
                if !touches {
                    continue;
                }
                let matches_other_dims = (0..dims).all(|k| {
                    k == d
                        || (nb.range.from()[k] == slice.range.from()[k]
                            && nb.range.to()[k] == slice.range.to()[k])
                });
                if matches_other_dims {
                    neighbors.push(nb);
                }
            }
            if !neighbors.is_empty() {
                dim = d;
                break;
            }
        }
        if neighbors.is_empty() {
            return Vec::new();
        }
        neighbors.sort_by_key(|n| n.range.from()[dim]);

        let weights: Vec<f64> = neighbors
            .iter()
            .map(|n| {
                n.range
                    .iter_indices()
                    .map(|idx| (self.element_weight)(&idx))
                    .sum::<f64>()
                    .max(f64::MIN_POSITIVE)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        let width = slice.range.width(dim);

        let mut pieces = Vec::with_capacity(neighbors.len());
        let mut from = slice.range.from()[dim];
        let mut acc = 0.0;
        for (i, nb) in neighbors.iter().enumerate() {
            acc += weights[i];
            let to = if i + 1 == neighbors.len() {
                slice.range.to()[dim]
            } else {
                slice.range.from()[dim] + ((acc / total) * width as f64).round() as i64
            };
            if from < to {
                let mut lo = slice.range.from().to_vec();
                let mut hi = slice.range.to().to_vec();
                lo[dim] = from;
                hi[dim] = to;
                pieces.push(TaskSlice {
                    process: nb.process,
                    range: Range::new(&lo, &hi),
                    tag: nb.tag,
                    map_no: slice.map_no,
                });
            }
            from = to;
        }
        pieces
    }
}

impl Partitioner for Reassign<'_> {
    fn run(
        &self,
        _space: &IndexSpace,
        _group: &ProcessGroup,
        base: Option<&Partitioning>,
    ) -> Vec<TaskSlice> {
        let Some(base) = base else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let mut survivors = Vec::new();
        let mut surrendered = Vec::new();
        for slice in base.slices() {
            match self.new_group.from_parent_id(slice.process) {
                Some(new_id) if new_id >= 0 => {
                    let renumbered = TaskSlice { process: new_id, ..*slice };
                    survivors.push(renumbered);
                    out.push(renumbered);
                }
                _ => surrendered.push(*slice),
            }
        }
        for slice in &surrendered {
            out.extend(self.redistribute(slice, &survivors));
        }
        out
    }

    fn algorithm_name(&self) -> &'static str {
        "reassign"
    }
}
