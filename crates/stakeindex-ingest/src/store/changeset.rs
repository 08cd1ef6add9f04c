//! Read-your-writes staging area for one event.

use super::{EntityStore, WriteSet};
use crate::Result;
use stakeindex_core::Entity;

/// Buffers the writes of a single event on top of a store.
///
/// Reads see staged writes first, then fall through to the store, so an
/// applier can load, modify and re-load records freely. Nothing reaches the
/// store until the owner commits [`Changeset::into_writes`].
pub struct Changeset<'a, S: EntityStore + ?Sized> {
    store: &'a S,
    writes: WriteSet,
}

impl<'a, S: EntityStore + ?Sized> Changeset<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            writes: WriteSet::default(),
        }
    }

    pub fn load<E: Entity>(&self, key: &str) -> Result<Option<E>> {
        if let Some(bytes) = self.writes.get(E::KEYSPACE, key) {
            return Ok(Some(serde_json::from_slice(bytes)?));
        }
        match self.store.get(E::KEYSPACE, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Whether a record exists, without decoding it.
    pub fn exists<E: Entity>(&self, key: &str) -> Result<bool> {
        if self.writes.get(E::KEYSPACE, key).is_some() {
            return Ok(true);
        }
        Ok(self.store.get(E::KEYSPACE, key)?.is_some())
    }

    pub fn upsert<E: Entity>(&mut self, entity: &E) -> Result<()> {
        self.writes.put(entity)
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> WriteSet {
        self.writes
    }
}
