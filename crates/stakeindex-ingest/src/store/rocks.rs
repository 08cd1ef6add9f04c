//! RocksDB-backed entity store.
//!
//! # Key Design
//!
//! - One column family per [`Keyspace`], named by [`Keyspace::as_str`]
//! - Keys: UTF-8 entity keys (addresses, hashes, ISO dates, padded positions)
//! - Values: JSON-encoded records with amounts as base-10 strings
//! - Every event is committed as one `WriteBatch`, so a crash never leaves a
//!   partially applied event on disk

use super::{EntityStore, WriteSet};
use crate::error::{Error, Result};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch, WriteOptions,
};
use stakeindex_core::Keyspace;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Durable entity store on RocksDB.
///
/// Thread-safe: can be shared across threads via `Arc<RocksStore>`.
pub struct RocksStore {
    db: DBWithThreadMode<MultiThreaded>,
    sync_writes: bool,
}

impl RocksStore {
    /// Open or create a store at the given path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use stakeindex_ingest::RocksStore;
    ///
    /// let store = RocksStore::open("./data/index")?;
    /// # Ok::<(), stakeindex_ingest::Error>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening entity store at {}", path.display());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.increase_parallelism(num_cpus::get().min(4) as i32);

        let descriptors = Keyspace::ALL.iter().map(|keyspace| {
            let mut cf_opts = Options::default();
            // Point lookups dominate: bloom filters skip SSTs for unknown keys.
            let mut block_opts = rocksdb::BlockBasedOptions::default();
            block_opts.set_bloom_filter(10.0, false);
            cf_opts.set_block_based_table_factory(&block_opts);
            cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
            ColumnFamilyDescriptor::new(keyspace.as_str(), cf_opts)
        });

        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db,
            sync_writes: false,
        })
    }

    /// Fsync the WAL on every commit.
    ///
    /// Off by default: the WAL already survives a process crash, and syncing
    /// only adds protection against power loss.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    fn cf(&self, keyspace: Keyspace) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db.cf_handle(keyspace.as_str()).ok_or_else(|| {
            Error::Storage(format!("missing column family '{}'", keyspace.as_str()))
        })
    }

    /// Approximate number of records in one keyspace.
    pub fn approximate_count(&self, keyspace: Keyspace) -> Result<u64> {
        let cf = self.cf(keyspace)?;
        let count = self
            .db
            .property_int_value_cf(&cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);
        Ok(count)
    }

    /// Flush all memtables to disk.
    pub fn flush(&self) -> Result<()> {
        for keyspace in Keyspace::ALL {
            let cf = self.cf(keyspace)?;
            self.db.flush_cf(&cf)?;
        }
        Ok(())
    }
}

impl EntityStore for RocksStore {
    fn get(&self, keyspace: Keyspace, key: &str) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(keyspace)?;
        Ok(self.db.get_cf(&cf, key.as_bytes())?)
    }

    fn commit(&self, writes: WriteSet) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut batch = WriteBatch::default();
        let count = writes.len();
        for ((keyspace, key), value) in writes {
            let cf = self.cf(keyspace)?;
            batch.put_cf(&cf, key.as_bytes(), value);
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &write_opts)?;
        debug!("Committed {} records", count);

        Ok(())
    }

    fn scan(&self, keyspace: Keyspace) -> Result<Vec<(String, Vec<u8>)>> {
        let cf = self.cf(keyspace)?;
        let mut entries = Vec::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            let key = String::from_utf8(key.into_vec())
                .map_err(|e| Error::Storage(format!("non UTF-8 key in {}: {e}", keyspace.as_str())))?;
            entries.push((key, value.into_vec()));
        }

        Ok(entries)
    }
}
