//! Two processes write different values for the same key before a sync;
//! the collective merge must surface `Error::UpdateConflict` to every
//! caller the same way, and an agreeing pair must merge cleanly.

use ispace::backend::local::LocalBackend;
use ispace::backend::Backend;
use ispace::error::Error;
use ispace::kv::KvStore;

#[test]
fn disagreeing_writes_raise_update_conflict() {
    let ranks = LocalBackend::world(2);

    let mut kv0 = KvStore::new("shared");
    kv0.set("epoch", b"1".to_vec());
    let journal0 = kv0.take_journal();

    let mut kv1 = KvStore::new("shared");
    kv1.set("epoch", b"2".to_vec());
    let journal1 = kv1.take_journal();

    ranks[0].stage_journal(journal0);
    let err = ranks[1].sync_kv(1, journal1).unwrap_err();
    assert!(matches!(err, Error::UpdateConflict { ref key, .. } if key == "epoch"));
}

#[test]
fn agreeing_writes_merge_and_apply_on_every_process() {
    let ranks = LocalBackend::world(3);

    let mut stores: Vec<KvStore> = (0..3).map(|_| KvStore::new("shared")).collect();
    stores[0].set("epoch", b"7".to_vec());
    stores[2].set("count", b"3".to_vec());

    let journals: Vec<_> = stores.iter_mut().map(KvStore::take_journal).collect();

    for (id, journal) in journals.iter().enumerate().take(2) {
        ranks[id].stage_journal(journal.clone());
    }
    let merged = ranks[2].sync_kv(2, journals[2].clone()).unwrap();
    let resolved = ispace::kv::merge_journals(&merged).unwrap();

    for store in &mut stores {
        store.apply_merged(&resolved);
    }
    for store in &stores {
        assert_eq!(store.get("epoch"), Some(b"7".as_slice()));
        assert_eq!(store.get("count"), Some(b"3".as_slice()));
    }
}
