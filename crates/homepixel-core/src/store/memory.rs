// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Holds rows in a Vec behind a RwLock. Nothing survives a restart, so the
// first poll after a restart re-inserts everything the channel returns.
// Useful for tests and for dry runs against a live channel.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::schema::{NodeSchema, StoredRecord};
use crate::traits::record_store::{PersistOutcome, RecordStore};

/// In-memory record store
///
/// Applies the same record checks and full-row duplicate rule as the SQLite
/// store.
///
/// # Example
///
/// ```rust,no_run
/// use homepixel_core::schema::NodeKind;
/// use homepixel_core::store::MemoryRecordStore;
/// use homepixel_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new(NodeKind::LightClapper.schema());
///     store.ensure_table().await?;
///     assert!(store.is_empty().await);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    schema: NodeSchema,
    inner: Arc<RwLock<Vec<StoredRecord>>>,
}

impl MemoryRecordStore {
    /// Create an empty store for the given schema
    pub fn new(schema: NodeSchema) -> Self {
        Self {
            schema,
            inner: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn ensure_table(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn persist(&self, records: &[StoredRecord]) -> Result<PersistOutcome, Error> {
        let mut rows = self.inner.write().await;
        let mut outcome = PersistOutcome::default();

        for record in records {
            if rows.contains(record) {
                outcome.duplicates += 1;
                continue;
            }
            self.schema.check_record(record)?;
            rows.push(record.clone());
            outcome.inserted += 1;
        }

        Ok(outcome)
    }

    async fn records(&self) -> Result<Vec<StoredRecord>, Error> {
        Ok(self.inner.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldValue, NodeKind};

    fn record(time: &str) -> StoredRecord {
        StoredRecord::new("2020-11-22", time)
            .with("location", FieldValue::text("my_room"))
            .with("nodeID", FieldValue::text("lightclapper_21"))
            .with("lightStatus", FieldValue::Integer(1))
    }

    #[tokio::test]
    async fn test_persist_skips_duplicates() {
        let store = MemoryRecordStore::new(NodeKind::LightClapper.schema());

        let outcome = store
            .persist(&[record("12:00:14"), record("12:00:15"), record("12:00:14")])
            .await
            .unwrap();

        assert_eq!(outcome, PersistOutcome { inserted: 2, duplicates: 1 });
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_persist_rejects_incomplete_record() {
        let store = MemoryRecordStore::new(NodeKind::LightClapper.schema());
        let partial = StoredRecord::new("2020-11-22", "12:00:14");

        assert!(matches!(
            store.persist(&[partial]).await,
            Err(Error::Validation(_))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_rows() {
        let store = MemoryRecordStore::new(NodeKind::LightClapper.schema());
        let view = store.clone();

        store.persist(&[record("12:00:14")]).await.unwrap();
        assert_eq!(view.records().await.unwrap(), vec![record("12:00:14")]);
    }
}
