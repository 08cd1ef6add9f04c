//! Keyed entity storage.
//!
//! The store holds one keyspace per record kind and knows nothing about field
//! semantics: values are opaque JSON bytes. Typed access goes through
//! [`EntityStoreExt`], and all writes produced by one event are staged in a
//! [`Changeset`] and committed as a single [`WriteSet`].
//!
//! # Backends
//!
//! - [`MemoryStore`] - `BTreeMap` behind a lock, for tests and dry runs
//! - [`RocksStore`] - RocksDB with one column family per keyspace
//!
//! # Atomicity
//!
//! [`EntityStore::commit`] must apply every entry of the write set or none of
//! them. Readers never observe part of an event.

mod changeset;
mod memory;
mod rocks;

pub use changeset::Changeset;
pub use memory::MemoryStore;
pub use rocks::RocksStore;

use crate::Result;
use serde::Serialize;
use stakeindex_core::{Entity, Keyspace};
use std::collections::BTreeMap;

/// Raw keyed storage with atomic multi-key commits.
pub trait EntityStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, keyspace: Keyspace, key: &str) -> Result<Option<Vec<u8>>>;

    /// Atomically apply every write in `writes`.
    fn commit(&self, writes: WriteSet) -> Result<()>;

    /// All entries of a keyspace in ascending key order.
    fn scan(&self, keyspace: Keyspace) -> Result<Vec<(String, Vec<u8>)>>;
}

/// Typed access on top of any [`EntityStore`].
pub trait EntityStoreExt: EntityStore {
    /// Load and decode the record stored under `key`.
    fn load<E: Entity>(&self, key: &str) -> Result<Option<E>> {
        match self.get(E::KEYSPACE, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write a single record as its own atomic commit.
    fn upsert<E: Entity>(&self, entity: &E) -> Result<()> {
        let mut writes = WriteSet::default();
        writes.put(entity)?;
        self.commit(writes)
    }

    /// Every record of kind `E`, in key order.
    fn list<E: Entity>(&self) -> Result<Vec<E>> {
        self.scan(E::KEYSPACE)?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(Into::into))
            .collect()
    }
}

impl<S: EntityStore + ?Sized> EntityStoreExt for S {}

impl<S: EntityStore + ?Sized> EntityStore for std::sync::Arc<S> {
    fn get(&self, keyspace: Keyspace, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(keyspace, key)
    }

    fn commit(&self, writes: WriteSet) -> Result<()> {
        (**self).commit(writes)
    }

    fn scan(&self, keyspace: Keyspace) -> Result<Vec<(String, Vec<u8>)>> {
        (**self).scan(keyspace)
    }
}

/// A set of encoded writes to commit together.
///
/// Later writes to the same key replace earlier ones, so the set holds the
/// final value of every key an event touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    entries: BTreeMap<(Keyspace, String), Vec<u8>>,
}

impl WriteSet {
    /// Encode and stage `entity` under its own key.
    pub fn put<E: Entity>(&mut self, entity: &E) -> Result<()> {
        let bytes = serde_json::to_vec(entity)?;
        self.entries.insert((E::KEYSPACE, entity.key()), bytes);
        Ok(())
    }

    pub fn get(&self, keyspace: Keyspace, key: &str) -> Option<&[u8]> {
        // BTreeMap lookups need an owned tuple key.
        self.entries
            .get(&(keyspace, key.to_string()))
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for WriteSet {
    type Item = ((Keyspace, String), Vec<u8>);
    type IntoIter = std::collections::btree_map::IntoIter<(Keyspace, String), Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Canonical dump of every keyspace.
///
/// Keys and keyspaces are ordered, and values are the stored JSON text, so two
/// snapshots compare equal exactly when the stores hold the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    keyspaces: BTreeMap<&'static str, BTreeMap<String, serde_json::Value>>,
    #[serde(skip)]
    raw: BTreeMap<&'static str, BTreeMap<String, Vec<u8>>>,
}

impl StateSnapshot {
    /// Read every keyspace of `store`.
    pub fn capture<S: EntityStore + ?Sized>(store: &S) -> Result<Self> {
        let mut snapshot = Self::default();
        for keyspace in Keyspace::ALL {
            let mut values = BTreeMap::new();
            let mut raw = BTreeMap::new();
            for (key, bytes) in store.scan(keyspace)? {
                values.insert(key.clone(), serde_json::from_slice(&bytes)?);
                raw.insert(key, bytes);
            }
            snapshot.keyspaces.insert(keyspace.as_str(), values);
            snapshot.raw.insert(keyspace.as_str(), raw);
        }
        Ok(snapshot)
    }

    /// Number of records in `keyspace`.
    pub fn count(&self, keyspace: Keyspace) -> usize {
        self.raw.get(keyspace.as_str()).map_or(0, BTreeMap::len)
    }

    /// Pretty JSON rendering, grouped by keyspace.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.keyspaces)?)
    }
}
