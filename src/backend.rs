//! The backend capability interface (component I): the narrow surface the
//! core depends on to actually move bytes between processes, plus a handful
//! of optional collective operations.
//!
//! Modeled on the teacher's capability-flagged [`io::cloud::traits`] style —
//! a trait with a small required core and optional methods carrying
//! sensible defaults — rather than requiring every backend to implement
//! every collective.

pub mod local;

use crate::error::Result;
use crate::group::ProcessGroup;
use crate::kv::ChangeJournal;

/// Health of one process as reported by [`Backend::status_check`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessStatus {
    Ok,
    Faulted,
}

/// The transport the core dispatches action sequences and KV syncs to.
///
/// `prepare`/`exec`/`cleanup`/`finalize` are required; everything else has
/// a default a single-machine backend can rely on.
pub trait Backend {
    /// Called once per sequence before the first `exec`; may reorder, fuse,
    /// or pre-post receives. Default: no-op.
    fn prepare(&self, _seq: &crate::action::ActionSequence) {}

    /// Synchronous execution of `seq`'s send/recv-shaped actions (anything
    /// the core itself cannot perform without crossing a process boundary).
    /// Returns only after every peer involved has completed its part.
    fn exec(&self, seq: &crate::action::ActionSequence, transport: &mut dyn Transport) -> Result<()>;

    /// Release backend-specific resources tied to `seq`. Default: no-op.
    fn cleanup(&self, _seq: &crate::action::ActionSequence) {}

    /// Drain outstanding communication at shutdown. Default: no-op.
    fn finalize(&self) {}

    /// Rebuild any backend sub-communicator after a group shrink. Default:
    /// no-op (single-machine backends keep one shared bus for every
    /// process, so there's nothing to rebuild).
    fn update_group(&self, _group: &ProcessGroup) {}

    /// Collective all-to-all exchange of KV change journals: every
    /// process's journal, including the caller's own, ready for
    /// [`crate::kv::merge_journals`].
    fn sync_kv(&self, my_id: i32, journal: ChangeJournal) -> Result<Vec<ChangeJournal>>;

    /// Fill `out` with per-process health; returns the fault count.
    /// Default: assumes every process is healthy (no probe available).
    fn status_check(&self, group: &ProcessGroup, out: &mut [ProcessStatus]) -> usize {
        for s in out.iter_mut().take(group.size()) {
            *s = ProcessStatus::Ok;
        }
        0
    }

    /// Build a sub-communicator excluding faulted ranks. Default: identity,
    /// since a backend without fault probing has no faulted ranks to
    /// exclude.
    fn eliminate_nodes(&self, _old: &ProcessGroup, new: &ProcessGroup, _status: &[ProcessStatus]) -> ProcessGroup {
        new.clone()
    }
}

/// The byte-level transport a [`Backend`] uses to actually move packed
/// payloads. Kept separate from `Backend` itself so the core (which knows
/// how to pack/unpack a typed [`crate::container::Container`]) supplies the
/// payload bytes without the backend needing to be generic over element
/// type.
pub trait Transport {
    fn send(&mut self, peer: i32, payload: &[u8]) -> Result<()>;
    fn recv(&mut self, peer: i32) -> Result<Vec<u8>>;
}
