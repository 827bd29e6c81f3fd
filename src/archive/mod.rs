/// SQLite-backed journal implementation.
pub mod sqlite;

use thiserror::Error;

use crate::update::StoredUpdate;

/// Journal failure taxonomy.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Database failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Payload (de)serialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Anything else.
    #[error("{0}")]
    Message(String),
}

/// Result alias for journal operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Append-only sink for the emitted update stream.
///
/// Journaled histories feed emulation replay and multi-day bundles.
pub trait UpdateSink: Send {
    /// Appends a batch, returning the highest durable sequence.
    fn append_updates(&mut self, updates: &[StoredUpdate]) -> ArchiveResult<u64>;

    /// Flushes buffered writes.
    fn flush(&mut self) -> ArchiveResult<()> {
        Ok(())
    }

    /// Deletes journaled updates up to and including `seq`.
    fn compact_through(&mut self, _seq: u64) -> ArchiveResult<usize> {
        Ok(0)
    }
}
