// # Record Store Trait
//
// Defines the interface the client loop uses to persist validated records.
//
// ## Purpose
//
// Stores are append-only: records are inserted unless an identical row is
// already present, and are never updated or deleted. Running the same poll
// twice therefore leaves the table unchanged.
//
// ## Implementations
//
// - SQLite: `SqliteRecordStore`, one table per node type
// - Memory: `MemoryRecordStore`, for tests and dry runs

use async_trait::async_trait;

use crate::schema::StoredRecord;

/// What a call to [`RecordStore::persist`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Rows written
    pub inserted: usize,
    /// Records skipped because an identical row existed
    pub duplicates: usize,
}

/// Trait for record store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call from any task. Implementations backed by
/// blocking I/O must move that work off the async executor.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create the backing table if it does not exist yet
    async fn ensure_table(&self) -> Result<(), crate::Error>;

    /// Insert every record that is not already stored
    ///
    /// Records are checked and inserted in order within a single session;
    /// rows written before a failure stay written.
    async fn persist(&self, records: &[StoredRecord]) -> Result<PersistOutcome, crate::Error>;

    /// All stored records in insertion order
    async fn records(&self) -> Result<Vec<StoredRecord>, crate::Error>;
}
