//! Reservations (component F): a precomputed mapping plan shared by several
//! partitionings of the same container, so repeated `switch_to` calls
//! between them skip reallocation.
//!
//! Modeled on the teacher's generation-counter invalidation pattern (spec
//! §9's reservation design note): the reservation owns the allocation,
//! callers hold a [`crate::handle::ReservationHandle`], and rebuilding
//! bumps the generation so stale handles are detected rather than silently
//! reused.

use crate::error::{Error, Result};
use crate::partitioning::Partitioning;
use std::collections::BTreeMap;

/// The union of ranges sharing one `tag`, and the single allocation sized
/// to cover it.
#[derive(Clone, Debug)]
struct TagPlan {
    element_count: u64,
}

/// A set of partitionings plus the per-tag allocation plan computed from
/// their union.
#[derive(Clone, Debug, Default)]
pub struct Reservation {
    generation: u32,
    partitionings: Vec<Partitioning>,
    tags: BTreeMap<u32, TagPlan>,
    /// Set by [`Reservation::alloc`]; the growth guard in `add` is inert
    /// until then, since the union is still being built up and has nothing
    /// committed yet to grow past.
    allocated: bool,
}

impl Reservation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Add a partitioning to the reservation's coverage set. Before
    /// [`Reservation::alloc`] this only ever grows the per-tag union; once
    /// allocated, a partitioning that would enlarge a tag's committed size
    /// is rejected with [`Error::OutOfMemory`] and the reservation must be
    /// rebuilt instead (spec §3: "adding a partitioning that would enlarge
    /// any tag is forbidden once allocated").
    pub fn add(&mut self, partitioning: &Partitioning) -> Result<()> {
        let mut candidate = self.tags.clone();
        for slice in partitioning.slices() {
            let entry = candidate.entry(slice.tag).or_insert(TagPlan { element_count: 0 });
            entry.element_count = entry.element_count.max(slice.range.size());
        }
        if self.allocated {
            for (tag, plan) in &candidate {
                if let Some(existing) = self.tags.get(tag) {
                    if plan.element_count > existing.element_count {
                        return Err(Error::OutOfMemory(format!(
                            "reservation tag {tag} would grow from {} to {} elements; rebuild required",
                            existing.element_count, plan.element_count
                        )));
                    }
                }
            }
        }
        self.tags = candidate;
        self.partitionings.push(partitioning.clone());
        Ok(())
    }

    /// Element count allocated for `tag`, if the reservation covers it.
    #[must_use]
    pub fn alloc_size(&self, tag: u32) -> Option<u64> {
        self.tags.get(&tag).map(|p| p.element_count)
    }

    /// Commit the current per-tag union as allocated (spec §3's
    /// `reservation_alloc`): from this point, `add` rejects any
    /// partitioning that would enlarge a tag beyond what was just
    /// committed.
    pub fn alloc(&mut self) {
        self.allocated = true;
    }

    /// Rebuild from scratch, bumping the generation so every outstanding
    /// [`crate::handle::ReservationHandle`] and cached action sequence
    /// referencing the old generation is known-stale. Re-adds each
    /// previously stored partitioning against a freshly un-allocated state,
    /// so a partitioning that grew a tag relative to another of this
    /// reservation's own partitionings (e.g. a halo partitioning sharing a
    /// base partitioning's tag) never trips the growth guard here.
    pub fn rebuild(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        let partitionings = std::mem::take(&mut self.partitionings);
        self.tags.clear();
        self.allocated = false;
        for p in &partitionings {
            self.add(p).expect("re-adding a reservation's own partitionings before the next alloc() never hits the growth guard");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::ProcessGroup;
    use crate::partitioner::Block;
    use crate::range::IndexSpace;

    #[test]
    fn add_twice_with_same_shape_succeeds() {
        let space = IndexSpace::new("s", &[100]).unwrap();
        let group = ProcessGroup::world(4, 0);
        let p1 = Partitioning::build("p1", &space, &group, &Block::new(0), None);
        let p2 = Partitioning::build("p2", &space, &group, &Block::new(0), None);
        let mut r = Reservation::new();
        r.add(&p1).unwrap();
        r.add(&p2).unwrap();
    }

    #[test]
    fn rebuild_bumps_generation() {
        let space = IndexSpace::new("s", &[100]).unwrap();
        let group = ProcessGroup::world(4, 0);
        let p1 = Partitioning::build("p1", &space, &group, &Block::new(0), None);
        let mut r = Reservation::new();
        r.add(&p1).unwrap();
        let g0 = r.generation();
        r.rebuild();
        assert_eq!(r.generation(), g0 + 1);
    }

    #[test]
    fn growth_guard_is_inert_until_alloc() {
        let space = IndexSpace::new("s", &[100]).unwrap();
        let group = ProcessGroup::world(4, 0);
        let base = Partitioning::build("base", &space, &group, &Block::new(0), None);
        let halo = Partitioning::build(
            "halo",
            &space,
            &group,
            &crate::partitioner::Halo::new(2),
            Some(&base),
        );
        let mut r = Reservation::new();
        r.add(&base).unwrap();
        // `halo`'s tag union is larger than `base`'s own; before `alloc` this
        // must succeed since nothing is committed yet.
        r.add(&halo).unwrap();
    }

    #[test]
    fn growth_guard_trips_after_alloc() {
        let space = IndexSpace::new("s", &[100]).unwrap();
        let group = ProcessGroup::world(4, 0);
        let base = Partitioning::build("base", &space, &group, &Block::new(0), None);
        let halo = Partitioning::build(
            "halo",
            &space,
            &group,
            &crate::partitioner::Halo::new(2),
            Some(&base),
        );
        let mut r = Reservation::new();
        r.add(&base).unwrap();
        r.alloc();
        let err = r.add(&halo).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory(_)));
    }

    #[test]
    fn rebuild_tolerates_a_base_and_halo_sharing_a_tag() {
        let space = IndexSpace::new("s", &[100]).unwrap();
        let group = ProcessGroup::world(4, 0);
        let base = Partitioning::build("base", &space, &group, &Block::new(0), None);
        let halo = Partitioning::build(
            "halo",
            &space,
            &group,
            &crate::partitioner::Halo::new(2),
            Some(&base),
        );
        let mut r = Reservation::new();
        r.add(&base).unwrap();
        r.add(&halo).unwrap();
        r.alloc();
        // Must not panic even though `halo`'s tag plan is larger than
        // `base`'s alone — this is exactly the case the old `.expect()`
        // could hit.
        r.rebuild();
    }
}
