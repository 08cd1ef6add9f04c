//! Error types for the ingestion pipeline.

use stakeindex_core::EventPosition;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort the application of an event.
///
/// Any error returned from [`Indexer::apply`](crate::Indexer::apply) means
/// nothing from that event was committed.
#[derive(Error, Debug)]
pub enum Error {
    /// RocksDB error.
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Storage backend failure outside RocksDB.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Record (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Domain validation error.
    #[error("Domain error: {0}")]
    Core(#[from] stakeindex_core::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An event arrived at or behind the cursor without having been seen.
    #[error("Out-of-order event: {received} is not after last applied {last}")]
    OutOfOrder {
        /// Last position committed by the indexer.
        last: EventPosition,
        /// Position of the rejected event.
        received: EventPosition,
    },

    /// A protocol event arrived before the staking protocol was initialized.
    #[error("Staking protocol is not initialized (event at {0})")]
    ProtocolNotInitialized(EventPosition),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the same event may succeed if applied again.
    ///
    /// Storage and I/O failures are transient; ordering and configuration
    /// errors will fail identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RocksDb(_) | Self::Storage(_) | Self::Io(_))
    }
}
