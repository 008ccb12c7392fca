//! Pre-built spaces, groups, and partitionings for common test scenarios.

use crate::backend::local::LocalBackend;
use crate::container::Container;
use crate::group::ProcessGroup;
use crate::partitioner::{All, Block};
use crate::partitioning::Partitioning;
use crate::range::IndexSpace;
use crate::reduce::Elem;

/// A 4-process [`ProcessGroup`] plus a 1-D space of `len` elements and its
/// [`Block`]-partitioning — the starting point for most transition tests.
#[must_use]
pub struct BlockedWorld {
    pub group: ProcessGroup,
    pub space: IndexSpace,
    pub partitioning: Partitioning,
    pub backends: Vec<LocalBackend>,
}

/// Build a `processes`-way world over a 1-D space `[0, len)`, partitioned
/// with [`Block::new(0)`].
///
/// # Example
///
/// ```
/// use ispace::testing::blocked_world;
///
/// let world = blocked_world(4, 100);
/// assert_eq!(world.partitioning.slices().len(), 4);
/// ```
pub fn blocked_world(processes: usize, len: i64) -> BlockedWorld {
    let space = IndexSpace::new("fixture", &[len]).expect("len must be positive");
    let backends = LocalBackend::world(processes);
    let group = ProcessGroup::world(processes, 0);
    let partitioning = Partitioning::build("blocked", &space, &group, &Block::new(0), None);
    BlockedWorld { group, space, partitioning, backends }
}

/// A single-process world with an `All`-partitioning, for tests that don't
/// care about distribution and just want a container to write into.
///
/// # Example
///
/// ```
/// use ispace::testing::single_process_container;
///
/// let (mut container, mut backend) = single_process_container::<f64>(10);
/// ```
pub fn single_process_container<T: Elem>(len: i64) -> (Container<T>, LocalBackend) {
    let space = IndexSpace::new("fixture", &[len]).expect("len must be positive");
    let group = ProcessGroup::world(1, 0);
    let backend = LocalBackend::world(1).remove(0);
    let container = Container::new(space, group);
    (container, backend)
}

/// A partitioning that assigns the whole space to every process (spec §4.C's
/// `All` algorithm), useful as a baseline to diff other partitionings
/// against.
///
/// # Example
///
/// ```
/// use ispace::testing::all_partitioning;
///
/// let (space, group, partitioning) = all_partitioning(3, 20);
/// assert!(partitioning.slices().iter().all(|s| s.range == space.full_range()));
/// ```
#[must_use]
pub fn all_partitioning(processes: usize, len: i64) -> (IndexSpace, ProcessGroup, Partitioning) {
    let space = IndexSpace::new("fixture", &[len]).expect("len must be positive");
    let group = ProcessGroup::world(processes, 0);
    let partitioning = Partitioning::build("all", &space, &group, &All, None);
    (space, group, partitioning)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_world_covers_every_process() {
        let world = blocked_world(4, 40);
        let mut processes: Vec<i32> = world.partitioning.slices().iter().map(|s| s.process).collect();
        processes.sort_unstable();
        processes.dedup();
        assert_eq!(processes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn all_partitioning_gives_every_process_the_full_range() {
        let (space, _group, partitioning) = all_partitioning(3, 20);
        for slice in partitioning.slices() {
            assert_eq!(slice.range, space.full_range());
        }
    }
}
