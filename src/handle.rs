//! Lightweight arena handles, replacing the pointer graph of the original
//! implementation (space -> group, container -> mapping -> reservation)
//! with 32-bit indices into [`crate::instance::Instance`]'s arenas.
//!
//! Each handle is small, `Copy`, and hashable — modeled directly on the
//! teacher's [`NodeId`](crate::node_id) — so `migrate_partitioning` and
//! friends become index rewrites instead of pointer surgery (design note in
//! spec §9).

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_handle {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            pub const fn new(v: u32) -> Self {
                Self(v)
            }

            /// Raw numeric value, for debugging/serialization only.
            #[must_use]
            pub const fn raw(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

define_handle!(SpaceId, "Handle to an [`crate::range::IndexSpace`] owned by an `Instance`.");
define_handle!(GroupId, "Handle to a [`crate::group::ProcessGroup`] owned by an `Instance`.");
define_handle!(PartitioningId, "Handle to a [`crate::partitioning::Partitioning`] owned by an `Instance`.");
define_handle!(ReservationId, "Handle to a [`crate::reservation::Reservation`] owned by an `Instance`.");

// No `ContainerId`: a `Container<T>` is generic over its element type and
// is never migrated or shared between handles the way a space/group/
// partitioning is, so `Instance` hands one back by value from its
// constructor rather than arena-storing it (see DESIGN.md).

/// A reservation handle paired with the generation it was bound at.
///
/// Containers and cached action sequences hold one of these rather than a
/// bare [`ReservationId`]; a mismatch against the reservation's current
/// generation means the reservation was rebuilt and any cached plan is
/// stale (spec §9, "reservation ownership").
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ReservationHandle {
    pub id: ReservationId,
    pub generation: u32,
}
