//! In-process simulated backend: every "process" is a handle into one
//! shared bus living in the test or demo driver's single OS thread.
//!
//! Grounded on the teacher's `io::cloud::fake::FakeConfig`/mock-io pattern
//! of swapping `Arc<Mutex<HashMap<...>>>` for a real service — here
//! `Rc<RefCell<...>>` instead, since spec §5 rules out in-process thread
//! parallelism entirely (concurrency is only ever across processes). Only
//! available under the `local-backend` feature; this is a testing and
//! small-demo backend, not a real transport.

use super::{Backend, ProcessStatus, Transport};
use crate::action::ActionSequence;
use crate::error::Result;
use crate::group::ProcessGroup;
use crate::kv::{merge_journals, ChangeJournal};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Shared state every rank's [`LocalBackend`] handle points at.
#[derive(Debug, Default)]
struct Bus {
    mailboxes: Vec<VecDeque<Vec<u8>>>,
    staged_journals: Vec<Option<ChangeJournal>>,
}

impl Bus {
    fn new(n: usize) -> Self {
        Self {
            mailboxes: (0..n).map(|_| VecDeque::new()).collect(),
            staged_journals: vec![None; n],
        }
    }
}

/// One process's handle onto a shared [`Bus`]. Cloning shares the same bus
/// (cheap `Rc` clone), matching `ProcessGroup`'s own cloning semantics.
#[derive(Clone, Debug)]
pub struct LocalBackend {
    bus: Rc<RefCell<Bus>>,
    my_id: i32,
}

impl LocalBackend {
    /// Create `n` linked backend handles sharing one bus, one per rank.
    #[must_use]
    pub fn world(n: usize) -> Vec<Self> {
        let bus = Rc::new(RefCell::new(Bus::new(n)));
        (0..n)
            .map(|id| Self { bus: Rc::clone(&bus), my_id: i32::try_from(id).unwrap_or(0) })
            .collect()
    }

    #[must_use]
    pub const fn my_id(&self) -> i32 {
        self.my_id
    }

    /// Stage this process's journal for the next [`Backend::sync_kv`] call.
    /// Every rank must stage before any rank calls `sync_kv`, since the
    /// local bus has no real blocking collective — see `DESIGN.md`.
    pub fn stage_journal(&self, journal: ChangeJournal) {
        let idx = usize::try_from(self.my_id).unwrap_or(0);
        self.bus.borrow_mut().staged_journals[idx] = Some(journal);
    }
}

impl Transport for LocalBackend {
    fn send(&mut self, peer: i32, payload: &[u8]) -> Result<()> {
        let idx = usize::try_from(peer).unwrap_or(0);
        self.bus.borrow_mut().mailboxes[idx].push_back(payload.to_vec());
        Ok(())
    }

    fn recv(&mut self, _peer: i32) -> Result<Vec<u8>> {
        let idx = usize::try_from(self.my_id).unwrap_or(0);
        self.bus
            .borrow_mut()
            .mailboxes[idx]
            .pop_front()
            .ok_or_else(|| crate::error::Error::BackendFailure {
                code: 1,
                message: "no pending message for this process".into(),
            })
    }
}

impl Backend for LocalBackend {
    fn exec(&self, _seq: &ActionSequence, _transport: &mut dyn Transport) -> Result<()> {
        // The local bus delivers synchronously inside send/recv; nothing
        // further to drive here.
        Ok(())
    }

    fn update_group(&self, _group: &ProcessGroup) {}

    fn sync_kv(&self, _my_id: i32, journal: ChangeJournal) -> Result<Vec<ChangeJournal>> {
        self.stage_journal(journal);
        let bus = self.bus.borrow();
        let journals: Vec<ChangeJournal> = bus
            .staged_journals
            .iter()
            .map(|j| j.clone().unwrap_or_default())
            .collect();
        // Validate now so a conflict surfaces to every caller identically;
        // the merged result itself is recomputed per-process from the same
        // staged inputs so no central state needs to persist past this call.
        merge_journals(&journals)?;
        Ok(journals)
    }

    fn status_check(&self, group: &ProcessGroup, out: &mut [ProcessStatus]) -> usize {
        for s in out.iter_mut().take(group.size()) {
            *s = ProcessStatus::Ok;
        }
        0
    }
}
