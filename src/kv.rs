//! Key-value store (component J): a sorted string-to-bytes table with an
//! append-only change journal between collective syncs.
//!
//! Grounded on `original_source/src/kvs.c`'s `laik_kvs_set`/`laik_kvs_sync`
//! pair — local `set`s only ever touch the journal, the entry table itself
//! is only rewritten at `sync` time — adapted into the teacher's
//! `CloudIOError`-flavored error reporting for the conflict case.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One recorded change since the last sync. `value = None` marks a
/// deletion (spec §4.J supplement: "deletion via zero-length value").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvChange {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

/// One process's pending changes, handed to [`crate::backend::Backend::sync_kv`].
pub type ChangeJournal = Vec<KvChange>;

/// A sorted table plus its pending journal.
#[derive(Clone, Debug, Default)]
pub struct KvStore {
    name: String,
    entries: BTreeMap<String, Vec<u8>>,
    journal: ChangeJournal,
    /// Keys touched since the last sync, so a second local `set` on the
    /// same key before a sync updates the journal in place rather than
    /// appending a duplicate record.
    updated: std::collections::HashSet<String>,
}

impl KvStore {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
            journal: Vec::new(),
            updated: std::collections::HashSet::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Local set: visible to local readers immediately, but not durable in
    /// the table proper until the next `sync`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        self.entries.insert(key.clone(), value.clone());
        self.record_change(key, Some(value));
    }

    /// Local delete via an empty value, per spec's ancillary supplement.
    pub fn delete(&mut self, key: impl Into<String>) {
        let key = key.into();
        self.entries.remove(&key);
        self.record_change(key, None);
    }

    fn record_change(&mut self, key: String, value: Option<Vec<u8>>) {
        if self.updated.insert(key.clone()) {
            self.journal.push(KvChange { key, value });
        } else if let Some(existing) = self.journal.iter_mut().find(|c| c.key == key) {
            existing.value = value;
        }
    }

    /// Take the pending journal, ready to hand to a backend's collective
    /// sync. Leaves the local table untouched (already applied by `set`).
    pub fn take_journal(&mut self) -> ChangeJournal {
        self.updated.clear();
        std::mem::take(&mut self.journal)
    }

    /// Apply the merged, conflict-checked journal returned by a collective
    /// sync to this process's table.
    pub fn apply_merged(&mut self, merged: &ChangeJournal) {
        for change in merged {
            match &change.value {
                Some(v) => {
                    self.entries.insert(change.key.clone(), v.clone());
                }
                None => {
                    self.entries.remove(&change.key);
                }
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the sorted table, for tests and debugging.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Merge-sort `journals` from every process by key, raising
/// [`Error::UpdateConflict`] the first time two processes wrote different
/// values for the same key in the same round (spec §4.J: "conflicting
/// updates ... panic" — recast here as a recoverable, fatal-by-convention
/// error per spec §7's error-kind table rather than an actual panic).
pub fn merge_journals(journals: &[ChangeJournal]) -> Result<ChangeJournal> {
    let mut by_key: BTreeMap<&str, &KvChange> = BTreeMap::new();
    for journal in journals {
        for change in journal {
            match by_key.get(change.key.as_str()) {
                None => {
                    by_key.insert(&change.key, change);
                }
                Some(existing) if existing.value != change.value => {
                    return Err(Error::UpdateConflict {
                        key: change.key.clone(),
                        a: existing.value.clone().unwrap_or_default(),
                        b: change.value.clone().unwrap_or_default(),
                    });
                }
                Some(_) => {}
            }
        }
    }
    Ok(by_key.into_values().cloned().collect())
}
