//! The `Instance`: arena-owner of spaces, partitionings, and reservations
//! for one process, plus the KV store and logger tied to it (spec §6's
//! `init`/`world`/`allow_world_resize`/`finalize` entry points).
//!
//! Grounded on the teacher's [`crate::pipeline::Pipeline`] — a single owner
//! of a process's derived state, handed out to transformation methods by
//! reference — generalized from one arena (the node graph) to the several
//! this crate needs (spaces, partitionings, reservations). A `Container<T>`
//! is deliberately NOT arena-stored here: unlike a space or partitioning it
//! is generic over its element type and never migrated between handles, so
//! `new_container` simply returns one by value (see `handle.rs` and
//! DESIGN.md).

use crate::backend::{Backend, ProcessStatus, Transport};
use crate::container::Container;
use crate::error::Result;
use crate::group::ProcessGroup;
use crate::handle::{GroupId, PartitioningId, ReservationId, SpaceId};
use crate::kv::KvStore;
use crate::log::{LogConfig, Logger};
use crate::partitioner::Partitioner;
use crate::partitioning::Partitioning;
use crate::range::IndexSpace;
use crate::reduce::Elem;
use crate::reservation::Reservation;

/// One process's view of the runtime: its current group, every space and
/// partitioning it has created, its reservations, its KV store, and its
/// logger. `B` is the backend/transport implementation (spec §4.I); the
/// `local-backend` feature's [`crate::backend::local::LocalBackend`] covers
/// both roles for the in-process testing/demo case.
pub struct Instance<B> {
    group: ProcessGroup,
    group_id: GroupId,
    backend: B,
    spaces: Vec<IndexSpace>,
    partitionings: Vec<Partitioning>,
    reservations: Vec<Reservation>,
    kv: KvStore,
    log: Logger,
    /// `SIZE_HINT` read at `init`, informational only — the core has no
    /// place that preallocates based on it, unlike a real MPI-style
    /// backend that might size its connection table from it.
    size_hint: Option<usize>,
}

impl<B: Backend + Transport> Instance<B> {
    /// Join the world: `group` is the process group the backend reports at
    /// startup, `backend` is the transport/collective implementation.
    /// Reads `LOG_LEVEL`, `LOG_FILE`, `SIZE_HINT` from the environment.
    #[must_use]
    pub fn init(group: ProcessGroup, backend: B) -> Self {
        let log = Logger::new(group.my_id(), LogConfig::from_env());
        let size_hint = std::env::var("SIZE_HINT").ok().and_then(|s| s.parse().ok());
        Self {
            group,
            group_id: GroupId::new(0),
            backend,
            spaces: Vec::new(),
            partitionings: Vec::new(),
            reservations: Vec::new(),
            kv: KvStore::new("kv"),
            log,
            size_hint,
        }
    }

    #[must_use]
    pub const fn size_hint(&self) -> Option<usize> {
        self.size_hint
    }

    #[must_use]
    pub const fn world(&self) -> &ProcessGroup {
        &self.group
    }

    #[must_use]
    pub const fn log(&self) -> &Logger {
        &self.log
    }

    #[must_use]
    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    pub fn kv_set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.kv.set(key, value);
    }

    pub fn kv_delete(&mut self, key: impl Into<String>) {
        self.kv.delete(key);
    }

    /// Collective KV sync (spec §4.J): exchange journals through the
    /// backend, merge-check for conflicting writes, and apply the result
    /// locally.
    pub fn kv_sync(&mut self) -> Result<()> {
        let journal = self.kv.take_journal();
        let journals = self.backend.sync_kv(self.group.my_id(), journal)?;
        let merged = crate::kv::merge_journals(&journals)?;
        self.kv.apply_merged(&merged);
        Ok(())
    }

    /// Create and register a new index space, returning a handle rather
    /// than the value itself (spec §3's "space" component, arena-backed).
    pub fn new_space(&mut self, name: impl Into<String>, extents: &[i64]) -> Result<SpaceId> {
        let space = IndexSpace::new(name, extents)?;
        self.spaces.push(space);
        Ok(SpaceId::new(u32::try_from(self.spaces.len() - 1).unwrap_or(u32::MAX)))
    }

    #[must_use]
    pub fn space(&self, id: SpaceId) -> &IndexSpace {
        &self.spaces[id.raw() as usize]
    }

    /// Run `partitioner` over `space` (and, if given, `base`) and register
    /// the result.
    pub fn new_partitioning(
        &mut self,
        name: impl Into<String>,
        space: SpaceId,
        partitioner: &dyn Partitioner,
        base: Option<PartitioningId>,
    ) -> PartitioningId {
        let built = {
            let space_ref = &self.spaces[space.raw() as usize];
            let base_ref = base.map(|id| &self.partitionings[id.raw() as usize]);
            Partitioning::build(name, space_ref, &self.group, partitioner, base_ref)
        };
        self.partitionings.push(built);
        PartitioningId::new(u32::try_from(self.partitionings.len() - 1).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub fn partitioning(&self, id: PartitioningId) -> &Partitioning {
        &self.partitionings[id.raw() as usize]
    }

    /// Construct a fresh container over `space`, not arena-stored (see
    /// module docs).
    #[must_use]
    pub fn new_container<T: Elem>(&self, space: SpaceId) -> Container<T> {
        Container::new(self.spaces[space.raw() as usize].clone(), self.group.clone())
    }

    pub fn new_reservation(&mut self) -> ReservationId {
        self.reservations.push(Reservation::new());
        ReservationId::new(u32::try_from(self.reservations.len() - 1).unwrap_or(u32::MAX))
    }

    /// Add a partitioning's coverage to a reservation's allocation plan.
    pub fn reservation_add(&mut self, id: ReservationId, partitioning: PartitioningId) -> Result<()> {
        let p = self.partitionings[partitioning.raw() as usize].clone();
        self.reservations[id.raw() as usize].add(&p)
    }

    #[must_use]
    pub fn reservation_alloc_size(&self, id: ReservationId, tag: u32) -> Option<u64> {
        self.reservations[id.raw() as usize].alloc_size(tag)
    }

    #[must_use]
    pub fn reservation_handle(&self, id: ReservationId) -> crate::handle::ReservationHandle {
        crate::handle::ReservationHandle { id, generation: self.reservations[id.raw() as usize].generation() }
    }

    /// Diff two partitionings into this process's action plan (spec §6:
    /// `calc_transition`). A thin wrapper over the planner so callers that
    /// want the granular API (rather than `Container::switch_to`, which
    /// does this internally) can inspect or cache the transition.
    #[must_use]
    pub fn calc_transition(
        &self,
        transition_id: crate::action::TransitionId,
        from: &Partitioning,
        to: &Partitioning,
        flow: crate::reduce::Flow,
        op: crate::reduce::ReductionOp,
    ) -> crate::planner::Transition {
        crate::planner::plan_transition(transition_id, self.group.my_id(), from, to, flow, op)
    }

    /// Build and optimize the action sequence for a transition (spec §6:
    /// `calc_actions`).
    #[must_use]
    pub fn calc_actions(&self, transition: crate::planner::Transition) -> crate::action::ActionSequence {
        crate::action::opt_seq(&transition.into_action_sequence())
    }

    /// Execute a container's transition to `to` (spec §6: `exec_actions`).
    /// Delegates to [`Container::switch_to`], which owns the actual
    /// send/recv/reduce/copy loop — `calc_transition`/`calc_actions` above
    /// exist so that plan and execution can be inspected/cached
    /// separately, but the execution itself always runs against a concrete
    /// typed container.
    ///
    /// `switch_to` needs `B` as both a `Backend` (`&self`, for
    /// `prepare`/`exec`/`cleanup`) and a `Transport` (`&mut self`, for the
    /// actual send/recv) at once; a cheap `Clone` of the backend handle
    /// (every backend in this core is a small handle onto shared state, not
    /// the state itself) stands in for the immutable half so both can be
    /// live simultaneously.
    pub fn exec_actions<T: Elem>(
        &mut self,
        container: &mut Container<T>,
        to: &Partitioning,
        flow: crate::reduce::Flow,
        op: crate::reduce::ReductionOp,
    ) -> Result<()>
    where
        B: Clone,
    {
        let backend = self.backend.clone();
        container.switch_to(to, flow, op, &backend, &mut self.backend)
    }

    /// Probe backend health and, if any process is faulted, rebuild the
    /// world group excluding it (spec §6: `allow_world_resize`). Returns
    /// the current group unchanged if nothing has failed.
    pub fn allow_world_resize(&mut self) -> ProcessGroup {
        let mut status = vec![ProcessStatus::Ok; self.group.size()];
        let faults = self.backend.status_check(&self.group, &mut status);
        if faults == 0 {
            return self.group.clone();
        }
        let to_remove: Vec<i32> = status
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == ProcessStatus::Faulted)
            .map(|(i, _)| i32::try_from(i).unwrap_or(0))
            .collect();
        let candidate = self.group.shrink(self.group_id, &to_remove);
        let new_group = self.backend.eliminate_nodes(&self.group, &candidate, &status);
        self.backend.update_group(&new_group);
        self.group = new_group.clone();
        new_group
    }

    /// Drain outstanding communication at shutdown (spec §6: `finalize`).
    pub fn finalize(&self) {
        self.backend.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::local::LocalBackend;
    use crate::partitioner::Block;
    use crate::reduce::{Flow, ReductionOp};

    #[test]
    fn init_and_space_roundtrip() {
        let backend = LocalBackend::world(1).remove(0);
        let mut inst = Instance::init(ProcessGroup::world(1, 0), backend);
        let space = inst.new_space("s", &[10]).unwrap();
        assert_eq!(inst.space(space).element_count(), 10);
    }

    #[test]
    fn exec_actions_moves_a_container_through_a_partitioning() {
        let backend = LocalBackend::world(1).remove(0);
        let mut inst = Instance::init(ProcessGroup::world(1, 0), backend);
        let space = inst.new_space("s", &[10]).unwrap();
        let part = inst.new_partitioning("p", space, &Block::new(0), None);
        let mut c: Container<f64> = inst.new_container(space);
        let partitioning = inst.partitioning(part).clone();
        inst.exec_actions(&mut c, &partitioning, Flow::Init, ReductionOp::None).unwrap();
        assert_eq!(c.partitioning().slices().len(), 1);
    }

    #[test]
    fn allow_world_resize_is_identity_without_faults() {
        let backend = LocalBackend::world(1).remove(0);
        let mut inst = Instance::init(ProcessGroup::world(1, 0), backend);
        let g = inst.allow_world_resize();
        assert_eq!(g.size(), 1);
    }
}
