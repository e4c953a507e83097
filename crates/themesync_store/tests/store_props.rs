//! Property tests for the version store.

use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::tempdir;
use themesync_store::{Snapshot, VersionStore};

fn entry() -> impl Strategy<Value = (String, String, String)> {
    (
        "[a-z]{1,6}(/[a-z]{1,6})?\\.(liquid|js|css)",
        prop_oneof!["development", "staging", "production"],
        "20[0-9]{2}-0[1-9]-1[0-9]T0[0-9]:00:00Z",
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn reopened_store_matches_committed_writes(writes in prop::collection::vec(entry(), 0..24)) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("themesync.lock");

        let mut expected: Snapshot = BTreeMap::new();
        {
            let store = VersionStore::open(&path).unwrap();
            let mut batch = store.batch();
            for (collection, key, value) in &writes {
                batch.write(collection, key, value).unwrap();
                expected
                    .entry(collection.clone())
                    .or_default()
                    .insert(key.clone(), value.clone());
            }
            batch.commit().unwrap();
            prop_assert_eq!(store.dump().unwrap(), expected.clone());
        }

        let reopened = VersionStore::open(&path).unwrap();
        prop_assert_eq!(reopened.dump().unwrap(), expected);
    }

    #[test]
    fn deleted_entries_read_as_not_found(writes in prop::collection::vec(entry(), 1..16)) {
        let dir = tempdir().unwrap();
        let store = VersionStore::open(&dir.path().join("themesync.lock")).unwrap();

        let mut batch = store.batch();
        for (collection, key, value) in &writes {
            batch.write(collection, key, value).unwrap();
        }
        batch.commit().unwrap();

        let (collection, key, _) = &writes[0];
        store.delete(collection, key).unwrap();
        let err = store.read(collection, key).unwrap_err();
        prop_assert!(err.is_not_found());
    }
}
