//! Process groups: the immutable ordered set of processes a partitioning or
//! container is defined over (component B).
//!
//! A group never mutates after creation. [`shrink`] produces a *child*
//! group with a lineage link back to its parent; the parent is never freed
//! while the child (or anything built from it) is reachable, because
//! `Instance`'s group arena never frees entries — see the handle design in
//! `handle.rs` and spec §9.

use crate::handle::GroupId;
use serde::{Deserialize, Serialize};

/// An ordered set of process identities with optional parent/child lineage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessGroup {
    size: usize,
    /// This process's id in `[0, size)`, or `-1` if not a member (e.g. a
    /// process removed by `shrink`).
    my_id: i32,
    parent: Option<GroupId>,
    /// `from_parent[i]` = this group's id for parent process `i`, or `-1` if
    /// process `i` was removed. `None` for the world group (no parent).
    from_parent: Option<Vec<i32>>,
    /// `to_parent[j]` = the parent's id for this group's process `j`.
    /// `None` for the world group.
    to_parent: Option<Vec<i32>>,
}

impl ProcessGroup {
    /// The root group produced by the backend at startup.
    #[must_use]
    pub const fn world(size: usize, my_id: i32) -> Self {
        Self {
            size,
            my_id,
            parent: None,
            from_parent: None,
            to_parent: None,
        }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn my_id(&self) -> i32 {
        self.my_id
    }

    #[must_use]
    pub const fn is_member(&self) -> bool {
        self.my_id >= 0
    }

    #[must_use]
    pub const fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    /// Map a process id in this group back to its id in the parent group.
    /// `None` for the world group or an out-of-range id.
    #[must_use]
    pub fn to_parent_id(&self, child_id: i32) -> Option<i32> {
        let table = self.to_parent.as_ref()?;
        table.get(usize::try_from(child_id).ok()?).copied()
    }

    /// Map a process id in the parent group to its id in this group, or
    /// `-1` if that process was removed by the shrink that produced this
    /// group. `None` for the world group or an out-of-range id.
    #[must_use]
    pub fn from_parent_id(&self, parent_id: i32) -> Option<i32> {
        let table = self.from_parent.as_ref()?;
        table.get(usize::try_from(parent_id).ok()?).copied()
    }

    /// Build the child group for a `shrink`: `n' = n - |to_remove|`,
    /// `from_parent[i] = new_id or -1`, `to_parent[j] = old_id`. Removed
    /// processes get `my_id = -1` in the child.
    ///
    /// `to_remove_sorted` must be sorted ascending and contain distinct ids
    /// in `[0, self.size())`.
    #[must_use]
    pub fn shrink(&self, parent_id: GroupId, to_remove_sorted: &[i32]) -> Self {
        let n = self.size;
        let mut from_parent = vec![-1i32; n];
        let mut to_parent = Vec::with_capacity(n - to_remove_sorted.len());
        let mut removed_idx = 0usize;
        let mut next_id: i32 = 0;
        for old_id in 0..n {
            let old_id_i32 = i32::try_from(old_id).unwrap_or(i32::MAX);
            if removed_idx < to_remove_sorted.len() && to_remove_sorted[removed_idx] == old_id_i32
            {
                removed_idx += 1;
                continue;
            }
            from_parent[old_id] = next_id;
            to_parent.push(old_id_i32);
            next_id += 1;
        }

        let my_id = if self.my_id >= 0 {
            from_parent
                .get(usize::try_from(self.my_id).unwrap_or(usize::MAX))
                .copied()
                .unwrap_or(-1)
        } else {
            -1
        };

        Self {
            size: to_parent.len(),
            my_id,
            parent: Some(parent_id),
            from_parent: Some(from_parent),
            to_parent: Some(to_parent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrink_renumbers_and_drops() {
        let world = ProcessGroup::world(4, 2);
        let child = world.shrink(GroupId::new(0), &[0, 2]);
        assert_eq!(child.size(), 2);
        // process 2 was removed -> my_id becomes -1
        assert_eq!(child.my_id(), -1);
        assert_eq!(child.from_parent_id(0), Some(-1));
        assert_eq!(child.from_parent_id(1), Some(0));
        assert_eq!(child.from_parent_id(2), Some(-1));
        assert_eq!(child.from_parent_id(3), Some(1));
        assert_eq!(child.to_parent_id(0), Some(1));
        assert_eq!(child.to_parent_id(1), Some(3));
    }

    #[test]
    fn shrink_survivor_keeps_membership() {
        let world = ProcessGroup::world(4, 1);
        let child = world.shrink(GroupId::new(0), &[0, 2]);
        assert_eq!(child.my_id(), 0);
        assert!(child.is_member());
    }
}
