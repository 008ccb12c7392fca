//! Explain-style printers for inspecting partitionings and transitions
//! during test failures, grounded on `original_source/src/debug.c`'s
//! `laik_log_Partitioning`/`laik_log_ActionSeq` dump routines.

use crate::action::{Action, ActionSequence};
use crate::partitioning::Partitioning;
use crate::planner::Transition;

/// Render one line per slice: `P<process> tag=<tag> map=<map_no> <range>`.
///
/// # Example
///
/// ```
/// use ispace::group::ProcessGroup;
/// use ispace::partitioner::Block;
/// use ispace::partitioning::Partitioning;
/// use ispace::range::IndexSpace;
/// use ispace::testing::explain_partitioning;
///
/// let space = IndexSpace::new("s", &[10]).unwrap();
/// let group = ProcessGroup::world(2, 0);
/// let p = Partitioning::build("p", &space, &group, &Block::new(0), None);
/// let text = explain_partitioning(&p);
/// assert!(text.contains("P0"));
/// ```
#[must_use]
pub fn explain_partitioning(partitioning: &Partitioning) -> String {
    let mut lines = Vec::new();
    for slice in partitioning.slices() {
        lines.push(format!(
            "P{} tag={} map={} {:?}",
            slice.process, slice.tag, slice.map_no, slice.range
        ));
    }
    lines.join("\n")
}

/// Render a transition's action buckets (initial/reduce/send/recv/local) as
/// labeled groups, in the order [`Transition::into_action_sequence`] would
/// actually execute them.
///
/// # Example
///
/// ```
/// use ispace::group::ProcessGroup;
/// use ispace::partitioner::Block;
/// use ispace::partitioning::Partitioning;
/// use ispace::planner::plan_transition;
/// use ispace::range::IndexSpace;
/// use ispace::reduce::{Flow, ReductionOp};
/// use ispace::action::TransitionId;
/// use ispace::testing::explain_transition;
///
/// let space = IndexSpace::new("s", &[10]).unwrap();
/// let group = ProcessGroup::world(1, 0);
/// let from = Partitioning::build("from", &space, &group, &Block::new(0), None);
/// let to = Partitioning::build("to", &space, &group, &Block::new(0), None);
/// let t = plan_transition(TransitionId(0), 0, &from, &to, Flow::Preserve, ReductionOp::None);
/// let text = explain_transition(&t);
/// assert!(text.contains("initial:"));
/// ```
#[must_use]
pub fn explain_transition(transition: &Transition) -> String {
    let mut out = String::new();
    for (label, actions) in [
        ("initial", &transition.initial),
        ("reduce", &transition.reduce),
        ("send", &transition.send),
        ("recv", &transition.recv),
        ("local", &transition.local),
    ] {
        out.push_str(&format!("{label}:\n"));
        for action in actions {
            out.push_str(&format!("  {}\n", explain_action(action)));
        }
    }
    out
}

/// Render an action sequence's optimized actions in execution order.
#[must_use]
pub fn explain_action_sequence(seq: &ActionSequence) -> String {
    seq.actions.iter().map(explain_action).collect::<Vec<_>>().join("\n")
}

fn explain_action(action: &Action) -> String {
    match action {
        Action::Fill { map_no, range, op, .. } => format!("Fill map={map_no} {range:?} op={op:?}"),
        Action::Copy { from_map, to_map, ranges, .. } => {
            format!("Copy map={from_map}->{to_map} {ranges:?}")
        }
        Action::PackAndSend { map_no, range, peer, .. } => {
            format!("PackAndSend map={map_no} {range:?} -> P{peer}")
        }
        Action::RecvAndUnpack { map_no, range, peer, .. } => {
            format!("RecvAndUnpack map={map_no} {range:?} <- P{peer}")
        }
        Action::Reduce { from_map, to_map, range, target, contributors, op, .. } => format!(
            "Reduce map={from_map}->{to_map} {range:?} target={target:?} contributors={contributors:?} op={op:?}"
        ),
        Action::GroupReduce { from_map, to_map, range, op, .. } => {
            format!("GroupReduce map={from_map}->{to_map} {range:?} op={op:?}")
        }
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::TransitionId;
    use crate::group::ProcessGroup;
    use crate::partitioner::Block;
    use crate::planner::plan_transition;
    use crate::range::IndexSpace;
    use crate::reduce::{Flow, ReductionOp};

    #[test]
    fn explain_partitioning_lists_every_slice() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(2, 0);
        let p = Partitioning::build("p", &space, &group, &Block::new(0), None);
        let text = explain_partitioning(&p);
        assert_eq!(text.lines().count(), p.slices().len());
    }

    #[test]
    fn explain_transition_has_every_section() {
        let space = IndexSpace::new("s", &[10]).unwrap();
        let group = ProcessGroup::world(1, 0);
        let from = Partitioning::build("from", &space, &group, &Block::new(0), None);
        let to = Partitioning::build("to", &space, &group, &Block::new(0), None);
        let t = plan_transition(TransitionId(0), 0, &from, &to, Flow::Preserve, ReductionOp::None);
        let text = explain_transition(&t);
        for label in ["initial:", "reduce:", "send:", "recv:", "local:"] {
            assert!(text.contains(label));
        }
    }
}
