//! In-memory entity store.

use super::{EntityStore, WriteSet};
use crate::Result;
use parking_lot::RwLock;
use stakeindex_core::Keyspace;
use std::collections::BTreeMap;

/// Entity store held entirely in memory.
///
/// Thread-safe: commits take the write lock once for the whole write set, so
/// concurrent readers see either none or all of an event's writes.
#[derive(Default)]
pub struct MemoryStore {
    keyspaces: RwLock<BTreeMap<Keyspace, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all keyspaces.
    pub fn len(&self) -> usize {
        self.keyspaces.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EntityStore for MemoryStore {
    fn get(&self, keyspace: Keyspace, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .keyspaces
            .read()
            .get(&keyspace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn commit(&self, writes: WriteSet) -> Result<()> {
        let mut keyspaces = self.keyspaces.write();
        for ((keyspace, key), value) in writes {
            keyspaces.entry(keyspace).or_default().insert(key, value);
        }
        Ok(())
    }

    fn scan(&self, keyspace: Keyspace) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .keyspaces
            .read()
            .get(&keyspace)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityStoreExt;
    use stakeindex_core::{EventPosition, IndexerCursor, SeenEvent, SeenStatus, TxHash};

    fn seen(block: u64) -> SeenEvent {
        let hash: TxHash = format!("0x{}", "ab".repeat(32)).parse().unwrap();
        SeenEvent {
            position: EventPosition::new(block, 0),
            transaction_hash: hash,
            status: SeenStatus::Applied,
        }
    }

    #[test]
    fn test_get_missing() {
        let store = MemoryStore::new();
        assert!(store.get(Keyspace::Users, "0xabc").unwrap().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_commit_and_load() {
        let store = MemoryStore::new();
        let cursor = IndexerCursor {
            last_position: Some(EventPosition::new(3, 1)),
            events_applied: 2,
            events_dropped: 1,
        };
        store.upsert(&cursor).unwrap();

        let loaded: IndexerCursor = store.load("cursor").unwrap().unwrap();
        assert_eq!(loaded, cursor);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_scan_is_key_ordered() {
        let store = MemoryStore::new();
        let mut writes = WriteSet::default();
        for block in [30, 10, 20] {
            writes.put(&seen(block)).unwrap();
        }
        store.commit(writes).unwrap();

        let listed: Vec<SeenEvent> = store.list().unwrap();
        let blocks: Vec<u64> = listed.iter().map(|s| s.position.block_number).collect();
        assert_eq!(blocks, vec![10, 20, 30]);
    }
}
