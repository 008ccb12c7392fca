//! The action sequence: a compact, replayable op stream produced by the
//! transition planner and consumed by a [`crate::backend::Backend`]
//! (component H).
//!
//! Modeled on the teacher's [`ExecutionExplanation`](crate::planner) idea of
//! keeping a plan as a small tagged-enum vector rather than a trait-object
//! graph, so the optimizer (`opt_seq`) can pattern-match and fuse adjacent
//! entries cheaply.

use crate::handle::ReservationHandle;
use crate::range::Range;
use crate::reduce::ReductionOp;
use serde::{Deserialize, Serialize};

/// Sentinel `from_map` value for a `Reduce`/`GroupReduce` action meaning
/// "this process contributes no local value, start from the op's neutral
/// element" — distinct from any real map number, which is always a dense
/// index starting at 0 for the owning process.
pub const NO_LOCAL_CONTRIBUTION: u32 = u32::MAX;

/// Identifies the transition an action belongs to. Only ever one live
/// transition per action sequence in this core, but carried per-action to
/// match the source's per-record context id (spec §3, "Action (H)").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub u32);

/// Root of a reduction, or every process (an all-reduce).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceTarget {
    Root(i32),
    All,
}

/// One step of an action sequence. Every variant carries `ctx`, the
/// transition it originated from — distinct from [`ActionSequence::transition`]
/// (which names the sequence's own, single live transition) because once a
/// reservation-bound sequence is cached and replayed across repeated
/// switches, or the optimizer coalesces actions, per-action provenance is
/// what lets a reviewer (or future cross-transition fusion) tell which
/// switch an action still belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Send { ctx: TransitionId, map_no: u32, offset: u64, count: u64, peer: i32 },
    Recv { ctx: TransitionId, map_no: u32, offset: u64, count: u64, peer: i32 },
    /// Optimizer-fused form of adjacent `Send`s to the same peer, backed by
    /// staging buffer `buf`.
    SendBuf { ctx: TransitionId, buf: usize, count: u64, peer: i32 },
    RecvBuf { ctx: TransitionId, buf: usize, count: u64, peer: i32 },
    PackAndSend { ctx: TransitionId, map_no: u32, range: Range, peer: i32 },
    RecvAndUnpack { ctx: TransitionId, map_no: u32, range: Range, peer: i32 },
    Pack { ctx: TransitionId, map_no: u32, range: Range, buf: usize },
    Unpack { ctx: TransitionId, map_no: u32, range: Range, buf: usize },
    Reduce {
        ctx: TransitionId,
        from_map: u32,
        to_map: u32,
        range: Range,
        target: ReduceTarget,
        /// Processes actually contributing a value, so the executor's recv
        /// loop doesn't wait on a peer that never sends (distinct from
        /// `target`, which names who *receives* the combined result).
        contributors: Vec<i32>,
        op: ReductionOp,
    },
    GroupReduce {
        ctx: TransitionId,
        in_group: Vec<i32>,
        out_group: Vec<i32>,
        from_map: u32,
        to_map: u32,
        range: Range,
        op: ReductionOp,
    },
    /// `ranges` are the global index ranges being copied; both `from_map`
    /// and `to_map`'s owning mappings know their own origin, so the
    /// executor derives local offsets from each range rather than carrying
    /// separate byte offsets the way `Send`/`Recv` do for already-
    /// linearized buffers. A vector (not a single range) so the optimizer
    /// can fuse adjacent `Copy`s to the same map pair without losing
    /// geometry.
    Copy { ctx: TransitionId, from_map: u32, to_map: u32, ranges: Vec<Range> },
    CopyFromBuf { ctx: TransitionId, entries: Vec<(u32, Range)>, buf: usize, count: u64 },
    CopyToBuf { ctx: TransitionId, entries: Vec<(u32, Range)>, buf: usize, count: u64 },
    /// Fill a local task-slice with the reduction op's neutral element —
    /// the planner's `Init` flow step. Not a named variant in spec §3's
    /// action list, but required to realize `Flow::Init` without inventing
    /// a parallel code path; folded away by the executor like any other
    /// local op.
    Fill { ctx: TransitionId, map_no: u32, range: Range, op: ReductionOp },
}

impl Action {
    /// Peer this action communicates with, if any — used by the optimizer
    /// to group adjacent same-peer actions.
    #[must_use]
    pub const fn peer(&self) -> Option<i32> {
        match self {
            Self::Send { peer, .. }
            | Self::Recv { peer, .. }
            | Self::SendBuf { peer, .. }
            | Self::RecvBuf { peer, .. }
            | Self::PackAndSend { peer, .. }
            | Self::RecvAndUnpack { peer, .. } => Some(*peer),
            _ => None,
        }
    }

    const fn is_send(&self) -> bool {
        matches!(self, Self::Send { .. } | Self::SendBuf { .. } | Self::PackAndSend { .. })
    }

    const fn is_recv(&self) -> bool {
        matches!(self, Self::Recv { .. } | Self::RecvBuf { .. } | Self::RecvAndUnpack { .. })
    }

    /// The transition this action was planned for.
    #[must_use]
    pub const fn ctx(&self) -> TransitionId {
        match self {
            Self::Send { ctx, .. }
            | Self::Recv { ctx, .. }
            | Self::SendBuf { ctx, .. }
            | Self::RecvBuf { ctx, .. }
            | Self::PackAndSend { ctx, .. }
            | Self::RecvAndUnpack { ctx, .. }
            | Self::Pack { ctx, .. }
            | Self::Unpack { ctx, .. }
            | Self::Reduce { ctx, .. }
            | Self::GroupReduce { ctx, .. }
            | Self::Copy { ctx, .. }
            | Self::CopyFromBuf { ctx, .. }
            | Self::CopyToBuf { ctx, .. }
            | Self::Fill { ctx, .. } => *ctx,
        }
    }
}

/// A plan plus the resources it needs to execute: staging buffers and an
/// optional reservation binding.
#[derive(Clone, Debug, Default)]
pub struct ActionSequence {
    pub transition: Option<TransitionId>,
    pub actions: Vec<Action>,
    /// Staging buffer sizes in elements, indexed the same as `buf` fields
    /// above.
    pub buffers: Vec<u64>,
    pub reservation: Option<ReservationHandle>,
}

impl ActionSequence {
    #[must_use]
    pub fn new(transition: TransitionId, actions: Vec<Action>) -> Self {
        Self {
            transition: Some(transition),
            actions,
            buffers: Vec::new(),
            reservation: None,
        }
    }

    #[must_use]
    pub fn bound_to(mut self, reservation: ReservationHandle) -> Self {
        self.reservation = Some(reservation);
        self
    }

    /// Drop staging buffers while keeping the reservation binding, mirroring
    /// spec §4.H's "cleanup keeps the reservation binding for re-execution".
    pub fn cleanup(&mut self) {
        self.buffers.clear();
    }
}

/// Coalesce adjacent send/recv to the same peer into buffered forms, merge
/// consecutive local copies, and reorder so all `RecvBuf` to a peer precede
/// all `SendBuf` to that peer (spec §4.H's deadlock-avoidance rule).
///
/// Idempotent: running this twice produces the same sequence (spec §8,
/// "action optimizer idempotence").
#[must_use]
pub fn opt_seq(seq: &ActionSequence) -> ActionSequence {
    let mut out = Vec::with_capacity(seq.actions.len());
    let mut buffers = Vec::new();
    let mut buf_peer: Vec<i32> = Vec::new();
    let mut i = 0;
    while i < seq.actions.len() {
        let a = &seq.actions[i];
        if let (true, Some(peer)) = (a.is_send() || a.is_recv(), a.peer()) {
            let is_send = a.is_send();
            let ctx = a.ctx();
            let mut count = 0u64;
            let mut j = i;
            while j < seq.actions.len() {
                let b = &seq.actions[j];
                if b.peer() != Some(peer) || (b.is_send() != is_send) {
                    break;
                }
                count += action_count(b);
                j += 1;
            }
            if j - i > 1 {
                let buf = buffers.len();
                buffers.push(count);
                buf_peer.push(peer);
                // `PackAndSend`/`RecvAndUnpack` carry the map/range the raw
                // `SendBuf`/`RecvBuf` form drops, so stage each one into
                // `buf` with an explicit Pack/Unpack before collapsing the
                // run — otherwise the fused action would reference a buffer
                // nothing ever filled.
                for action in &seq.actions[i..j] {
                    if let Action::PackAndSend { ctx, map_no, range, .. } = action {
                        out.push(Action::Pack { ctx: *ctx, map_no: *map_no, range: *range, buf });
                    }
                }
                if is_send {
                    out.push(Action::SendBuf { ctx, buf, count, peer });
                } else {
                    out.push(Action::RecvBuf { ctx, buf, count, peer });
                }
                for action in &seq.actions[i..j] {
                    if let Action::RecvAndUnpack { ctx, map_no, range, .. } = action {
                        out.push(Action::Unpack { ctx: *ctx, map_no: *map_no, range: *range, buf });
                    }
                }
                i = j;
                continue;
            }
        }
        out.push(a.clone());
        i += 1;
    }

    // Merge consecutive local Copy actions with matching map pairs into one.
    let mut merged: Vec<Action> = Vec::with_capacity(out.len());
    for a in out {
        if let (
            Some(Action::Copy { ctx: pctx, from_map: pf, to_map: pt, ranges: pr }),
            Action::Copy { from_map, to_map, ranges, .. },
        ) = (merged.last().cloned(), &a)
        {
            if pf == *from_map && pt == *to_map {
                let mut combined = pr;
                combined.extend(ranges.iter().copied());
                let last = merged.last_mut().unwrap();
                *last = Action::Copy { ctx: pctx, from_map: pf, to_map: pt, ranges: combined };
                continue;
            }
        }
        merged.push(a);
    }

    // Deadlock-avoidance reorder: within each peer, all RecvBuf before all
    // SendBuf. Stable partition by (peer, is_recv-first). `Pack`/`Unpack`
    // are keyed to the same tier as the `SendBuf`/`RecvBuf` they stage for
    // (via `buf_peer`) so the sort can't separate a staged transfer from
    // its buffer fill/drain — the stable sort then keeps Pack-before-
    // SendBuf and RecvBuf-before-Unpack, since both share a tier and
    // `opt_seq`'s fusion loop already emitted them in that relative order.
    merged.sort_by_key(|a| match a {
        Action::RecvBuf { peer, .. } | Action::Recv { peer, .. } | Action::RecvAndUnpack { peer, .. } => {
            (Some(*peer), 0)
        }
        Action::Unpack { buf, .. } => (Some(buf_peer[*buf]), 0),
        Action::SendBuf { peer, .. } | Action::Send { peer, .. } | Action::PackAndSend { peer, .. } => {
            (Some(*peer), 1)
        }
        Action::Pack { buf, .. } => (Some(buf_peer[*buf]), 1),
        _ => (None, 2),
    });

    ActionSequence {
        transition: seq.transition,
        actions: merged,
        buffers,
        reservation: seq.reservation,
    }
}

fn action_count(a: &Action) -> u64 {
    match a {
        Action::Send { count, .. }
        | Action::Recv { count, .. }
        | Action::SendBuf { count, .. }
        | Action::RecvBuf { count, .. } => *count,
        Action::PackAndSend { range, .. } | Action::RecvAndUnpack { range, .. } => range.size(),
        Action::Copy { ranges, .. } => ranges.iter().map(Range::size).sum(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: TransitionId = TransitionId(0);

    #[test]
    fn opt_seq_is_idempotent() {
        let seq = ActionSequence::new(
            TransitionId(0),
            vec![
                Action::Copy { ctx: CTX, from_map: 0, to_map: 1, ranges: vec![Range::new_1d(0, 4)] },
                Action::Copy { ctx: CTX, from_map: 0, to_map: 1, ranges: vec![Range::new_1d(4, 10)] },
                Action::Send { ctx: CTX, map_no: 0, offset: 0, count: 4, peer: 1 },
                Action::Send { ctx: CTX, map_no: 0, offset: 4, count: 4, peer: 1 },
            ],
        );
        let once = opt_seq(&seq);
        let twice = opt_seq(&once);
        assert_eq!(once.actions, twice.actions);
    }

    #[test]
    fn opt_seq_merges_copies() {
        let seq = ActionSequence::new(
            TransitionId(0),
            vec![
                Action::Copy { ctx: CTX, from_map: 0, to_map: 1, ranges: vec![Range::new_1d(0, 4)] },
                Action::Copy { ctx: CTX, from_map: 0, to_map: 1, ranges: vec![Range::new_1d(4, 10)] },
            ],
        );
        let opt = opt_seq(&seq);
        assert_eq!(
            opt.actions,
            vec![Action::Copy {
                ctx: CTX,
                from_map: 0,
                to_map: 1,
                ranges: vec![Range::new_1d(0, 4), Range::new_1d(4, 10)]
            }]
        );
    }

    #[test]
    fn opt_seq_keeps_unpack_after_its_recv_buf_through_the_deadlock_sort() {
        let seq = ActionSequence::new(
            TransitionId(0),
            vec![
                Action::RecvAndUnpack { ctx: CTX, map_no: 0, range: Range::new_1d(0, 4), peer: 1 },
                Action::RecvAndUnpack { ctx: CTX, map_no: 0, range: Range::new_1d(4, 8), peer: 1 },
            ],
        );
        let opt = opt_seq(&seq);
        assert!(matches!(opt.actions[0], Action::RecvBuf { buf: 0, peer: 1, .. }));
        assert!(matches!(opt.actions[1], Action::Unpack { buf: 0, .. }));
        assert!(matches!(opt.actions[2], Action::Unpack { buf: 0, .. }));
    }

    #[test]
    fn opt_seq_stages_pack_and_unpack_around_fused_transfers() {
        let seq = ActionSequence::new(
            TransitionId(0),
            vec![
                Action::PackAndSend { ctx: CTX, map_no: 0, range: Range::new_1d(0, 4), peer: 1 },
                Action::PackAndSend { ctx: CTX, map_no: 0, range: Range::new_1d(4, 8), peer: 1 },
            ],
        );
        let opt = opt_seq(&seq);
        assert!(matches!(opt.actions[0], Action::Pack { buf: 0, .. }));
        assert!(matches!(opt.actions[1], Action::Pack { buf: 0, .. }));
        assert!(matches!(opt.actions[2], Action::SendBuf { buf: 0, count: 8, peer: 1, .. }));
        assert_eq!(opt.buffers, vec![8]);
    }
}
