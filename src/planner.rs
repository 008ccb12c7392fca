//! Transition planner (component G): diffs two partitionings of the same
//! space under a flow/reduction policy and emits the minimal local action
//! list the calling process must execute.
//!
//! Grounded on the teacher's optimizer-pipeline shape (`planner.rs`'s
//! staged passes over a `Pipeline`) generalized from a linear op graph to
//! the four-subgroup diff spec §4.G describes. Since this core has no
//! in-process threads (§5, single-threaded-per-process), the planner only
//! ever computes the local process's share of the transition — there is no
//! "everyone's plan" to build, each process calls this independently.

use crate::action::{Action, ActionSequence, ReduceTarget, TransitionId, NO_LOCAL_CONTRIBUTION};
use crate::partitioner::TaskSlice;
use crate::partitioning::Partitioning;
use crate::range::Range;
use crate::reduce::{Flow, ReductionOp};

/// The four-subgroup diff of one process's obligations between two
/// partitionings, plus the reduce step's subgroup definitions.
#[derive(Clone, Debug, Default)]
pub struct Transition {
    pub id: TransitionId,
    pub local: Vec<Action>,
    pub initial: Vec<Action>,
    pub send: Vec<Action>,
    pub recv: Vec<Action>,
    pub reduce: Vec<Action>,
}

impl Transition {
    /// Ordering rule from spec §4.G: initial -> reduce -> (send/recv
    /// interleaved by ascending peer id) -> local copy.
    #[must_use]
    pub fn into_action_sequence(self) -> ActionSequence {
        let mut actions = Vec::new();
        actions.extend(self.initial);
        actions.extend(self.reduce);

        let mut by_peer: Vec<Action> = Vec::new();
        by_peer.extend(self.recv);
        by_peer.extend(self.send);
        by_peer.sort_by_key(|a| a.peer().unwrap_or(i32::MAX));
        actions.extend(by_peer);

        actions.extend(self.local);
        ActionSequence::new(self.id, actions)
    }
}

/// Compute the local process's transition from `from_part` to `to_part`
/// under `(flow, op)`. `my_id` identifies the calling process within both
/// partitionings' shared group.
#[must_use]
pub fn plan_transition(
    id: TransitionId,
    my_id: i32,
    from_part: &Partitioning,
    to_part: &Partitioning,
    flow: Flow,
    op: ReductionOp,
) -> Transition {
    let mut t = Transition { id, ..Transition::default() };

    if std::ptr::eq(from_part, to_part) && op == ReductionOp::None {
        return t;
    }

    let my_from: Vec<&TaskSlice> = from_part.slices().iter().filter(|s| s.process == my_id).collect();
    let my_to: Vec<&TaskSlice> = to_part.slices().iter().filter(|s| s.process == my_id).collect();

    if flow == Flow::Init {
        for to_slice in &my_to {
            t.initial.push(Action::Fill { ctx: id, map_no: to_slice.map_no, range: to_slice.range, op });
        }
    }

    // A destination range covered by more than one `from_part` process is
    // handled entirely by the reduce block below (it already accounts for
    // every contributor, including this process's own), so ordinary
    // copy/send/recv must skip it or it would clobber the combined result
    // with just one process's pre-reduce contribution.
    let is_multi_contributor = |range: &Range| {
        op != ReductionOp::None
            && from_part
                .slices()
                .iter()
                .filter(|s| s.range.intersect(range).is_some())
                .map(|s| s.process)
                .collect::<std::collections::BTreeSet<_>>()
                .len()
                > 1
    };

    // Local: intersections where both sides are owned by this process.
    for from_slice in &my_from {
        for to_slice in &my_to {
            if is_multi_contributor(&to_slice.range) {
                continue;
            }
            if let Some(overlap) = from_slice.range.intersect(&to_slice.range) {
                t.local.push(Action::Copy {
                    ctx: id,
                    from_map: from_slice.map_no,
                    to_map: to_slice.map_no,
                    ranges: vec![overlap],
                });
            }
        }
    }

    // Send: this process owns the from-side, some other process owns the
    // to-side.
    for from_slice in &my_from {
        for to_slice in to_part.slices() {
            if to_slice.process == my_id || is_multi_contributor(&to_slice.range) {
                continue;
            }
            if let Some(overlap) = from_slice.range.intersect(&to_slice.range) {
                t.send.push(Action::PackAndSend {
                    ctx: id,
                    map_no: from_slice.map_no,
                    range: overlap,
                    peer: to_slice.process,
                });
            }
        }
    }

    // Recv: this process owns the to-side, some other process owns the
    // from-side.
    for to_slice in &my_to {
        if is_multi_contributor(&to_slice.range) {
            continue;
        }
        for from_slice in from_part.slices() {
            if from_slice.process == my_id {
                continue;
            }
            if let Some(overlap) = from_slice.range.intersect(&to_slice.range) {
                t.recv.push(Action::RecvAndUnpack {
                    ctx: id,
                    map_no: to_slice.map_no,
                    range: overlap,
                    peer: from_slice.process,
                });
            }
        }
    }

    // Reduce: every range where more than one `from_part` process lands on
    // the same `to_part` index. A process takes part either as a
    // contributor (its `from` slice overlaps the range, even if it owns no
    // destination slice there — e.g. reducing to a single root) or as an
    // owner (it owns the destination slice), or both.
    if op != ReductionOp::None {
        let mut ranges: Vec<Range> = my_to.iter().map(|s| s.range).collect();
        for to_slice in to_part.slices() {
            if to_slice.process == my_id {
                continue;
            }
            if my_from.iter().any(|s| s.range.intersect(&to_slice.range).is_some()) && !ranges.contains(&to_slice.range) {
                ranges.push(to_slice.range);
            }
        }

        for range in ranges {
            let mut contributors: Vec<i32> = from_part
                .slices()
                .iter()
                .filter(|s| s.range.intersect(&range).is_some())
                .map(|s| s.process)
                .collect();
            contributors.sort_unstable();
            contributors.dedup();
            if contributors.len() <= 1 {
                continue;
            }
            let all_processes = from_part.slices().iter().map(|s| s.process).collect::<std::collections::BTreeSet<_>>();
            let mut out_group: Vec<i32> = to_part
                .slices()
                .iter()
                .filter(|s| s.range.intersect(&range).is_some())
                .map(|s| s.process)
                .collect();
            out_group.sort_unstable();
            out_group.dedup();

            // My own contribution to this reduce, if any: the local `from`
            // slice (if one exists) that overlaps the target range. Absent
            // a contribution, the sentinel tells the executor to start its
            // accumulator from the op's neutral element instead.
            let from_map = my_from
                .iter()
                .find(|s| s.range.intersect(&range).is_some())
                .map_or(NO_LOCAL_CONTRIBUTION, |s| s.map_no);

            // The destination map_no this process writes to, if it owns a
            // slice here at all — the sentinel doubles as "nothing to
            // write", since the executor's map lookup silently no-ops for
            // it when this process is a pure contributor.
            let to_map = my_to
                .iter()
                .find(|s| s.range == range)
                .map_or(NO_LOCAL_CONTRIBUTION, |s| s.map_no);

            if contributors.len() == all_processes.len() && out_group.len() == all_processes.len() {
                t.reduce.push(Action::Reduce {
                    ctx: id,
                    from_map,
                    to_map,
                    range,
                    target: ReduceTarget::All,
                    contributors,
                    op,
                });
            } else if out_group.len() == 1 {
                t.reduce.push(Action::Reduce {
                    ctx: id,
                    from_map,
                    to_map,
                    range,
                    target: ReduceTarget::Root(out_group[0]),
                    contributors,
                    op,
                });
            } else {
                t.reduce.push(Action::GroupReduce {
                    ctx: id,
                    in_group: contributors,
                    out_group,
                    from_map,
                    to_map,
                    range,
                    op,
                });
            }
        }
    }

    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::ProcessGroup;
    use crate::partitioner::Block;
    use crate::range::IndexSpace;

    #[test]
    fn identical_partitioning_no_reduce_is_empty() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(2, 0);
        let p = Partitioning::build("p", &space, &group, &Block::new(0), None);
        let t = plan_transition(TransitionId(0), 0, &p, &p, Flow::Preserve, ReductionOp::None);
        assert!(t.local.is_empty());
        assert!(t.send.is_empty());
        assert!(t.recv.is_empty());
    }

    #[test]
    fn block_to_all_emits_recv_from_every_other_process() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(2, 0);
        let from = Partitioning::build("from", &space, &group, &Block::new(0), None);
        let to = Partitioning::build("to", &space, &group, &crate::partitioner::All, None);
        let t = plan_transition(TransitionId(0), 0, &from, &to, Flow::Preserve, ReductionOp::None);
        assert!(!t.local.is_empty());
        assert!(!t.recv.is_empty());
    }

    #[test]
    fn all_to_single_emits_reduce_for_non_owning_contributor() {
        let space = IndexSpace::new("s", &[1]).unwrap();
        let group = ProcessGroup::world(3, 0);
        let from = Partitioning::build("from", &space, &group, &crate::partitioner::All, None);
        let to = Partitioning::build("to", &space, &group, &crate::partitioner::Single(0), None);

        // Process 1 owns no slice in `to` at all, but it must still emit a
        // reduce action carrying its contribution toward the root.
        let t = plan_transition(TransitionId(0), 1, &from, &to, Flow::Preserve, ReductionOp::Sum);
        assert_eq!(t.reduce.len(), 1);
        match &t.reduce[0] {
            Action::Reduce { target: ReduceTarget::Root(r), contributors, .. } => {
                assert_eq!(*r, 0);
                assert_eq!(contributors, &vec![0, 1, 2]);
            }
            other => panic!("expected Reduce(Root(0)), got {other:?}"),
        }
        assert!(t.send.is_empty());
        assert!(t.local.is_empty());
    }

    #[test]
    fn all_to_all_reduce_targets_every_process() {
        let space = IndexSpace::new("s", &[1]).unwrap();
        let group = ProcessGroup::world(3, 0);
        let part = Partitioning::build("all", &space, &group, &crate::partitioner::All, None);
        let t = plan_transition(TransitionId(0), 0, &part, &part, Flow::Preserve, ReductionOp::Sum);
        assert_eq!(t.reduce.len(), 1);
        assert!(matches!(&t.reduce[0], Action::Reduce { target: ReduceTarget::All, .. }));
    }
}
