//! Containers and mappings (component E): the typed data living behind a
//! partitioning, plus the `switch_to` state machine that moves it between
//! partitionings.
//!
//! Grounded on the teacher's `PCollection<T>` holding a `Pipeline` clone
//! rather than being arena-stored itself — a container here holds its
//! space/group by value (both are small and `Clone`) instead of an
//! `Instance` handle, since unlike spaces/groups/partitionings a container
//! is never migrated or shared across handles, only moved.

use crate::action::{opt_seq, Action, ActionSequence, ReduceTarget, NO_LOCAL_CONTRIBUTION};
use crate::backend::{Backend, Transport};
use crate::error::{Error, Result};
use crate::group::ProcessGroup;
use crate::handle::ReservationHandle;
use crate::partitioner::TaskSlice;
use crate::partitioning::Partitioning;
use crate::planner::plan_transition;
use crate::range::{IndexSpace, Range};
use crate::reduce::{Elem, Flow, ReductionOp};
use std::collections::HashMap;

/// A cached, optimized action sequence from a prior `switch_to` between the
/// same pair of partitionings under the same `(flow, op)`, reusable while
/// the bound reservation's generation hasn't moved on.
///
/// Keyed on partitioning *names* rather than the `Partitioning` values
/// themselves: `Partitioning` has no `Eq`/`Hash` (its slice vector isn't
/// cheap to compare), and within one reservation's lifetime a name
/// uniquely identifies one partitioning shape.
#[derive(Clone, Debug)]
struct CachedSequence {
    from_name: String,
    to_name: String,
    flow: Flow,
    op: ReductionOp,
    generation: u32,
    sequence: ActionSequence,
}

/// A single allocation backing one `tag`'s worth of a partitioning: a
/// contiguous buffer laid out in row-major order relative to `range`'s own
/// origin.
#[derive(Clone, Debug)]
pub struct Mapping<T> {
    pub map_no: u32,
    pub range: Range,
    data: Vec<T>,
    /// Set once `set_external_memory` hands ownership to the caller; the
    /// container stops managing (and must not drop) `data` in that case —
    /// modeled as a flag rather than an enum so normal `get`/`set` code
    /// doesn't need to match on it.
    external: bool,
}

impl<T: Elem> Mapping<T> {
    fn filled(map_no: u32, range: Range, value: T) -> Self {
        Self { map_no, range, data: vec![value; range.size() as usize], external: false }
    }

    #[must_use]
    pub fn get(&self, index: &[i64]) -> T {
        self.data[self.range.linearize(index) as usize]
    }

    pub fn set(&mut self, index: &[i64], value: T) {
        let offset = self.range.linearize(index) as usize;
        self.data[offset] = value;
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// Space + element type + current partitioning + mapping list.
pub struct Container<T: Elem> {
    space: IndexSpace,
    group: ProcessGroup,
    partitioning: Partitioning,
    mappings: HashMap<u32, Mapping<T>>,
    reservation: Option<ReservationHandle>,
    cached_sequence: Option<CachedSequence>,
    next_transition: u32,
}

impl<T: Elem> Container<T> {
    #[must_use]
    pub fn new(space: IndexSpace, group: ProcessGroup) -> Self {
        Self {
            space,
            group,
            partitioning: Partitioning::empty("<unswitched>"),
            mappings: HashMap::new(),
            reservation: None,
            cached_sequence: None,
            next_transition: 0,
        }
    }

    /// Bind a reservation so that repeated `switch_to` calls between the
    /// same pair of partitionings reuse their optimized action sequence
    /// instead of replanning it from scratch each time (spec §9's
    /// reservation-keyed caching). Clears any cache from a prior binding.
    pub fn bind_reservation(&mut self, reservation: ReservationHandle) {
        self.reservation = Some(reservation);
        self.cached_sequence = None;
    }

    #[must_use]
    pub fn space(&self) -> &IndexSpace {
        &self.space
    }

    #[must_use]
    pub fn partitioning(&self) -> &Partitioning {
        &self.partitioning
    }

    #[must_use]
    pub fn get_map(&self, map_no: u32) -> Option<&Mapping<T>> {
        self.mappings.get(&map_no)
    }

    pub fn get_map_mut(&mut self, map_no: u32) -> Option<&mut Mapping<T>> {
        self.mappings.get_mut(&map_no)
    }

    /// Hand ownership of `map_no`'s backing buffer to the caller; the
    /// container keeps only the bookkeeping, not the data, until the next
    /// `switch_to` reallocates it (spec §4.E: `set_external_memory`).
    pub fn set_external_memory(&mut self, map_no: u32, data: Vec<T>) {
        if let Some(mapping) = self.mappings.get_mut(&map_no) {
            mapping.data = data;
            mapping.external = true;
        }
    }

    /// Release every mapping. The container may be switched again
    /// afterwards, starting from an empty partitioning.
    pub fn free(&mut self) {
        self.mappings.clear();
        self.partitioning = Partitioning::empty("<freed>");
    }

    /// Move this container's data from its current partitioning to `to`
    /// under `(flow, op)`.
    ///
    /// Builds the transition's optimized action sequence (spec §6's
    /// `calc_transition` + `calc_actions`, reused from a bound
    /// reservation's cache when the partitioning pair and generation
    /// haven't changed) and executes it action-by-action. `backend` wraps
    /// the sequence with `prepare`/`exec`/`cleanup` the way spec §4.E's
    /// `Backend::exec` delegation describes; since `Backend::exec` isn't
    /// generic over the element type, the actual typed pack/unpack/send/
    /// recv/reduce work still happens here, with `backend`/`transport`
    /// serving as the hooks a real network backend would drive completion
    /// through (the local backend's `exec` is a no-op for exactly this
    /// reason — see `backend::local`).
    pub fn switch_to(
        &mut self,
        to: &Partitioning,
        flow: Flow,
        op: ReductionOp,
        backend: &dyn Backend,
        transport: &mut dyn Transport,
    ) -> Result<()> {
        let my_id = self.group.my_id();
        let transition_id = crate::action::TransitionId(self.next_transition);
        self.next_transition += 1;

        let t = plan_transition(transition_id, my_id, &self.partitioning, to, flow, op);

        if flow == Flow::Preserve {
            self.check_preserve_coverage(to, &t)?;
        }

        let seq = self.action_sequence_for(to, flow, op, t);
        backend.prepare(&seq);

        let my_to: Vec<&TaskSlice> = to.slices().iter().filter(|s| s.process == my_id).collect();
        let mut new_mappings: HashMap<u32, Mapping<T>> = HashMap::new();
        for slice in &my_to {
            new_mappings
                .entry(slice.map_no)
                .or_insert_with(|| Mapping::filled(slice.map_no, slice.range, T::neutral(ReductionOp::Sum)));
        }

        let mut bufs: HashMap<usize, Vec<u8>> = HashMap::new();
        for action in &seq.actions {
            match action {
                Action::Fill { map_no, range, op, .. } => {
                    if let Some(m) = new_mappings.get_mut(map_no) {
                        let neutral = T::neutral(*op);
                        for idx in range.iter_indices() {
                            m.set(&idx, neutral);
                        }
                    }
                }
                Action::Copy { from_map, to_map, ranges, .. } => {
                    let Some(src) = self.mappings.get(from_map) else { continue };
                    let Some(dst) = new_mappings.get_mut(to_map) else { continue };
                    for range in ranges {
                        for idx in range.iter_indices() {
                            dst.set(&idx, src.get(&idx));
                        }
                    }
                }
                Action::PackAndSend { .. } | Action::RecvAndUnpack { .. } => {
                    self.apply_transport_action(action, &mut new_mappings, transport)?;
                }
                Action::Pack { map_no, range, buf, .. } => {
                    let Some(src) = self.mappings.get(map_no) else { continue };
                    let bytes = bufs.entry(*buf).or_default();
                    bytes.extend(range.iter_indices().flat_map(|idx| src.get(&idx).to_bytes()));
                }
                Action::SendBuf { buf, peer, .. } => {
                    if let Some(bytes) = bufs.get(buf) {
                        transport.send(*peer, bytes)?;
                    }
                }
                Action::RecvBuf { buf, peer, .. } => {
                    let bytes = transport.recv(*peer)?;
                    bufs.insert(*buf, bytes);
                }
                Action::Unpack { map_no, range, buf, .. } => {
                    let Some(bytes) = bufs.get(buf) else { continue };
                    let Some(dst) = new_mappings.get_mut(map_no) else { continue };
                    let width = bytes.len() / range.size().max(1) as usize;
                    for (idx, chunk) in range.iter_indices().zip(bytes.chunks(width)) {
                        dst.set(&idx, T::from_bytes(chunk));
                    }
                }
                Action::Reduce { .. } | Action::GroupReduce { .. } => {
                    self.apply_reduce(action, &mut new_mappings, transport)?;
                }
                Action::Send { .. } | Action::Recv { .. } | Action::CopyFromBuf { .. } | Action::CopyToBuf { .. } => {
                    // Not emitted by this planner/optimizer pair; kept in
                    // the enum for a future backend that plans its own
                    // sends directly rather than through `PackAndSend`.
                }
            }
        }

        backend.exec(&seq, transport)?;
        backend.cleanup(&seq);

        self.mappings = new_mappings;
        self.partitioning = to.clone();
        Ok(())
    }

    /// Reuse the cached sequence from a bound reservation if the
    /// partitioning pair, flow, op, and reservation generation all still
    /// match; otherwise (re)plan and, if a reservation is bound, cache the
    /// result for the next call.
    fn action_sequence_for(
        &mut self,
        to: &Partitioning,
        flow: Flow,
        op: ReductionOp,
        t: crate::planner::Transition,
    ) -> ActionSequence {
        let Some(reservation) = self.reservation else {
            return opt_seq(&t.into_action_sequence());
        };
        if let Some(cached) = &self.cached_sequence {
            if cached.from_name == self.partitioning.name()
                && cached.to_name == to.name()
                && cached.flow == flow
                && cached.op == op
                && cached.generation == reservation.generation
            {
                return cached.sequence.clone();
            }
        }
        let seq = opt_seq(&t.into_action_sequence()).bound_to(reservation);
        self.cached_sequence = Some(CachedSequence {
            from_name: self.partitioning.name().to_string(),
            to_name: to.name().to_string(),
            flow,
            op,
            generation: reservation.generation,
            sequence: seq.clone(),
        });
        seq
    }

    fn check_preserve_coverage(&self, to: &Partitioning, t: &crate::planner::Transition) -> Result<()> {
        let my_id = self.group.my_id();
        for slice in to.slices().iter().filter(|s| s.process == my_id) {
            let mut covered: Vec<Range> = Vec::new();
            for a in &t.local {
                if let Action::Copy { to_map, ranges, .. } = a {
                    if *to_map == slice.map_no {
                        covered.extend(ranges.iter().copied());
                    }
                }
            }
            for a in &t.recv {
                if let Action::RecvAndUnpack { map_no, range, .. } = a {
                    if *map_no == slice.map_no {
                        covered.push(*range);
                    }
                }
            }
            for a in &t.reduce {
                match a {
                    Action::Reduce { to_map, range, .. } | Action::GroupReduce { to_map, range, .. } => {
                        if *to_map == slice.map_no {
                            covered.push(*range);
                        }
                    }
                    _ => {}
                }
            }
            let covered_size: u64 = covered.iter().map(Range::size).sum();
            if covered_size < slice.range.size() {
                return Err(Error::MissingSource(format!(
                    "partitioning {:?} needs index range {:?} that the source partitioning does not cover",
                    to.name(),
                    slice.range
                )));
            }
        }
        Ok(())
    }

    fn apply_transport_action(
        &mut self,
        action: &Action,
        new_mappings: &mut HashMap<u32, Mapping<T>>,
        transport: &mut dyn Transport,
    ) -> Result<()> {
        match action {
            Action::PackAndSend { map_no, range, peer, .. } => {
                let Some(src) = self.mappings.get(map_no) else { return Ok(()) };
                let bytes: Vec<u8> = range.iter_indices().flat_map(|idx| src.get(&idx).to_bytes()).collect();
                transport.send(*peer, &bytes)
            }
            Action::RecvAndUnpack { map_no, range, peer, .. } => {
                let bytes = transport.recv(*peer)?;
                let Some(dst) = new_mappings.get_mut(map_no) else { return Ok(()) };
                let width = bytes.len() / range.size().max(1) as usize;
                for (idx, chunk) in range.iter_indices().zip(bytes.chunks(width)) {
                    dst.set(&idx, T::from_bytes(chunk));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn apply_reduce(
        &mut self,
        action: &Action,
        new_mappings: &mut HashMap<u32, Mapping<T>>,
        transport: &mut dyn Transport,
    ) -> Result<()> {
        let (from_map, to_map, range, op, in_group, out_group) = match action {
            Action::Reduce { from_map, to_map, range, target, contributors, op, .. } => {
                let out_group = match target {
                    ReduceTarget::All => (0..self.group.size() as i32).collect(),
                    ReduceTarget::Root(r) => vec![*r],
                };
                (*from_map, *to_map, *range, *op, contributors.clone(), out_group)
            }
            Action::GroupReduce { in_group, out_group, from_map, to_map, range, op, .. } => {
                (*from_map, *to_map, *range, *op, in_group.clone(), out_group.clone())
            }
            _ => return Ok(()),
        };

        let my_id = self.group.my_id();
        let contribution: Option<Vec<T>> = if from_map == NO_LOCAL_CONTRIBUTION {
            None
        } else {
            self.mappings.get(&from_map).map(|m| range.iter_indices().map(|idx| m.get(&idx)).collect())
        };

        let is_contributor = in_group.contains(&my_id);
        if is_contributor {
            if let Some(vals) = &contribution {
                let bytes: Vec<u8> = vals.iter().flat_map(|v| v.to_bytes()).collect();
                for &peer in &out_group {
                    if peer != my_id {
                        transport.send(peer, &bytes)?;
                    }
                }
            }
        }

        if !out_group.contains(&my_id) {
            return Ok(());
        }

        let len = range.size() as usize;
        let mut acc: Vec<T> = match &contribution {
            Some(vals) if is_contributor => vals.clone(),
            _ => vec![T::neutral(op); len],
        };
        for &peer in &in_group {
            if peer == my_id {
                continue;
            }
            let bytes = transport.recv(peer)?;
            let width = bytes.len() / len.max(1);
            for (i, chunk) in bytes.chunks(width).enumerate() {
                acc[i] = acc[i].combine(T::from_bytes(chunk), op);
            }
        }

        if let Some(dst) = new_mappings.get_mut(&to_map) {
            for (idx, value) in range.iter_indices().zip(acc) {
                dst.set(&idx, value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::local::LocalBackend;
    use crate::partitioner::{All, Block};

    /// `switch_to` needs its backend as both `&dyn Backend` and
    /// `&mut dyn Transport` at once; `LocalBackend` is a cheap `Rc` handle,
    /// so a clone stands in for the immutable half.
    fn sw<T: Elem>(
        c: &mut Container<T>,
        to: &Partitioning,
        flow: Flow,
        op: ReductionOp,
        backend: &mut LocalBackend,
    ) -> Result<()> {
        let b = backend.clone();
        c.switch_to(to, flow, op, &b, backend)
    }

    #[test]
    fn round_trip_preserves_values() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(1, 0);
        let mut c: Container<f64> = Container::new(space.clone(), group.clone());
        let p = Partitioning::build("p", &space, &group, &Block::new(0), None);
        let mut backend = LocalBackend::world(1).remove(0);
        sw(&mut c, &p, Flow::Init, ReductionOp::None, &mut backend).unwrap();
        for (i, idx) in p.slices()[0].range.iter_indices().enumerate() {
            c.get_map_mut(0).unwrap().set(&idx, i as f64);
        }
        let p2 = p.clone();
        sw(&mut c, &p2, Flow::Preserve, ReductionOp::None, &mut backend).unwrap();
        for (i, idx) in p.slices()[0].range.iter_indices().enumerate() {
            assert_eq!(c.get_map(0).unwrap().get(&idx), i as f64);
        }
    }

    #[test]
    fn block_sum_via_all_reduce() {
        let space = IndexSpace::new("s", &[1000]).unwrap();
        let n = 4usize;
        let group = ProcessGroup::world(n, 0);
        let block = Partitioning::build("block", &space, &group, &Block::new(0), None);

        let mut backends = LocalBackend::world(n);
        let mut containers: Vec<Container<f64>> = (0..n)
            .map(|id| Container::new(space.clone(), ProcessGroup::world(n, id as i32)))
            .collect();

        for (id, c) in containers.iter_mut().enumerate() {
            sw(c, &block, Flow::Init, ReductionOp::None, &mut backends[id]).unwrap();
            let slice = block.slices().iter().find(|s| s.process as usize == id).unwrap();
            for idx in slice.range.iter_indices() {
                c.get_map_mut(slice.map_no).unwrap().set(&idx, idx[0] as f64);
            }
        }

        // Every process's local sum lands at the same single index, held in
        // a shared `All` partitioning (every process owns an overlapping
        // slice of the whole 1-element space) so the final switch's
        // `from_part` genuinely lists all n processes as contributors —
        // a per-process `Single` partitioning would only ever see itself.
        let sum_space = IndexSpace::new("sum", &[1]).unwrap();
        let all_part = Partitioning::build("all", &sum_space, &group, &All, None);
        let mut sums: Vec<Container<f64>> = (0..n)
            .map(|id| Container::new(sum_space.clone(), ProcessGroup::world(n, id as i32)))
            .collect();
        for (id, c) in sums.iter_mut().enumerate() {
            sw(c, &all_part, Flow::Init, ReductionOp::None, &mut backends[id]).unwrap();
            let slice = block.slices().iter().find(|s| s.process as usize == id).unwrap();
            let local_sum: f64 = containers[id]
                .get_map(slice.map_no)
                .unwrap()
                .as_slice()
                .iter()
                .sum();
            c.get_map_mut(0).unwrap().set(&[0], local_sum);
        }

        // The local testing backend delivers mail synchronously rather than
        // concurrently, so a fully symmetric all-to-all exchange can't be
        // driven by calling every rank once in any single order — whichever
        // rank goes first still needs a message nobody has sent yet. Route
        // the reduce through a root instead (contributors send before the
        // root ever looks at its mailbox), then broadcast the root's result
        // back out (root sends before anyone else tries to receive). The
        // end state matches a genuine `All + Preserve + Sum` switch: every
        // rank holds the combined total.
        let root_part = Partitioning::build("root", &sum_space, &group, &crate::partitioner::Single(0), None);
        for id in [1, 2, 3, 0] {
            sw(&mut sums[id], &root_part, Flow::Preserve, ReductionOp::Sum, &mut backends[id]).unwrap();
        }
        for id in [0, 1, 2, 3] {
            sw(&mut sums[id], &all_part, Flow::Preserve, ReductionOp::None, &mut backends[id]).unwrap();
        }
        let totals: Vec<f64> = (0..n).map(|id| sums[id].get_map(0).unwrap().get(&[0])).collect();
        for total in totals {
            assert!((total - 499_500.0).abs() < 1e-6);
        }
    }

    #[test]
    fn bound_reservation_caches_the_action_sequence() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(1, 0);
        let mut c: Container<f64> = Container::new(space.clone(), group.clone());
        let p = Partitioning::build("p", &space, &group, &Block::new(0), None);
        let mut backend = LocalBackend::world(1).remove(0);

        let mut reservation = crate::reservation::Reservation::new();
        reservation.add(&p).unwrap();
        let handle = crate::handle::ReservationHandle { id: crate::handle::ReservationId::new(0), generation: reservation.generation() };
        c.bind_reservation(handle);

        sw(&mut c, &p, Flow::Init, ReductionOp::None, &mut backend).unwrap();
        let first = c.cached_sequence.clone().unwrap();
        sw(&mut c, &p, Flow::Init, ReductionOp::None, &mut backend).unwrap();
        let second = c.cached_sequence.clone().unwrap();
        assert_eq!(first.sequence.actions, second.sequence.actions);

        // A later generation (as if the reservation had been rebuilt) must
        // not reuse the stale cache entry.
        let stale_handle = crate::handle::ReservationHandle { id: handle.id, generation: handle.generation + 1 };
        c.bind_reservation(stale_handle);
        assert!(c.cached_sequence.is_none());
    }
}
