// # SQLite Record Store
//
// One SQLite file per node type, one table per file, no indices and no
// migrations.
//
// ## Sessions
//
// [`RecordDb`] only works inside an open session. [`RecordDb::open`] returns
// a [`Session`] guard; dropping the guard commits the pending transaction and
// closes the connection, on every exit path. Calling a table operation on a
// `RecordDb` without an open session fails with `Error::State`.
//
// ## Table Layout
//
// ```sql
// create table LightClapper (date text, time text, location text, nodeID text, lightStatus integer)
// ```
//
// Rows have no key. Duplicate detection is a full-row match.

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, Row, params_from_iter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::schema::{ColumnKind, FieldValue, NodeSchema, StoredRecord};
use crate::traits::record_store::{PersistOutcome, RecordStore};

/// Table access for one node type over a SQLite file
#[derive(Debug)]
pub struct RecordDb {
    path: PathBuf,
    schema: NodeSchema,
    conn: Option<Connection>,
}

impl RecordDb {
    /// Describe a table; nothing is opened yet
    pub fn new(path: impl AsRef<Path>, schema: NodeSchema) -> Result<Self> {
        schema.validate()?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            schema,
            conn: None,
        })
    }

    /// Open a scoped session
    ///
    /// The returned guard commits and closes the connection when dropped.
    pub fn open(&mut self) -> Result<Session<'_>> {
        self.connect()?;
        Ok(Session { db: self })
    }

    /// Open the connection and start a transaction
    ///
    /// Prefer [`RecordDb::open`]; this is the manual half of the session for
    /// callers that manage the lifetime themselves.
    pub fn connect(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Err(Error::state(format!(
                "Session already open on {}",
                self.path.display()
            )));
        }

        let conn = Connection::open(&self.path)?;
        conn.execute_batch("BEGIN")?;
        debug!("Opened {}", self.path.display());
        self.conn = Some(conn);
        Ok(())
    }

    /// Commit and close the connection; a no-op without an open session
    pub fn disconnect(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        conn.close().map_err(|(_, e)| Error::from(e))?;
        debug!("Closed {}", self.path.display());
        Ok(())
    }

    /// Whether a session is open
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    pub fn schema(&self) -> &NodeSchema {
        &self.schema
    }

    fn conn(&self, operation: &str) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(|| {
            Error::state(format!(
                "{} called outside an open session on {}",
                operation,
                self.path.display()
            ))
        })
    }

    /// Whether the node's table exists
    pub fn table_exists(&self) -> Result<bool> {
        let conn = self.conn("table_exists")?;
        let count: i64 = conn.query_row(
            "SELECT count(name) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [&self.schema.table],
            |row| row.get(0),
        )?;
        Ok(count == 1)
    }

    /// Create the node's table
    pub fn create_table(&self) -> Result<()> {
        let conn = self.conn("create_table")?;
        debug!("Creating table {}", self.schema.table);

        let columns: Vec<String> = ["date text".to_string(), "time text".to_string()]
            .into_iter()
            .chain(
                self.schema
                    .columns
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.kind.sql_type())),
            )
            .collect();

        conn.execute_batch(&format!(
            "create table {} ({})",
            self.schema.table,
            columns.join(", ")
        ))?;
        Ok(())
    }

    /// Whether a row equal to `record` in every column exists
    pub fn record_exists(&self, record: &StoredRecord) -> Result<bool> {
        let conn = self.conn("record_exists")?;

        let Some(values) = self.row_values(record) else {
            // A record without every column cannot match a stored row
            return Ok(false);
        };

        let predicate = self
            .schema
            .column_names()
            .iter()
            .map(|name| format!("{} = ?", name))
            .collect::<Vec<_>>()
            .join(" AND ");

        let count: i64 = conn.query_row(
            &format!(
                "SELECT count(*) FROM {} WHERE {}",
                self.schema.table, predicate
            ),
            params_from_iter(values),
            |row| row.get(0),
        )?;

        debug!("Record exists? {}", count > 0);
        Ok(count > 0)
    }

    /// Insert a record
    pub fn add_record(&self, record: &StoredRecord) -> Result<()> {
        let conn = self.conn("add_record")?;
        self.schema.check_record(record)?;

        let values = self
            .row_values(record)
            .ok_or_else(|| Error::validation("Record does not match the table layout"))?;
        let placeholders = vec!["?"; values.len()].join(", ");

        conn.execute(
            &format!(
                "insert into {} values({})",
                self.schema.table, placeholders
            ),
            params_from_iter(values),
        )?;
        debug!("Added record {} {}", record.date, record.time);
        Ok(())
    }

    /// All rows in insertion order
    pub fn get_records(&self) -> Result<Vec<StoredRecord>> {
        let conn = self.conn("get_records")?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY rowid",
            self.schema.column_names().join(", "),
            self.schema.table
        ))?;

        let records = stmt
            .query_map([], |row| self.read_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Column values in table order, or `None` if a column is missing
    fn row_values(&self, record: &StoredRecord) -> Option<Vec<SqlValue>> {
        let mut values = vec![
            SqlValue::Text(record.date.clone()),
            SqlValue::Text(record.time.clone()),
        ];

        for column in &self.schema.columns {
            let value = match record.get(column.name)? {
                FieldValue::Text(s) => SqlValue::Text(s.clone()),
                FieldValue::Integer(v) => SqlValue::Integer(*v),
                FieldValue::Real(v) => SqlValue::Real(*v),
            };
            values.push(value);
        }

        Some(values)
    }

    fn read_row(&self, row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
        let mut record = StoredRecord::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?);

        for (offset, column) in self.schema.columns.iter().enumerate() {
            let idx = offset + 2;
            let value = match column.kind {
                ColumnKind::Text => FieldValue::Text(row.get(idx)?),
                ColumnKind::Status => FieldValue::Integer(row.get(idx)?),
                ColumnKind::Real => FieldValue::Real(row.get(idx)?),
            };
            record = record.with(column.name, value);
        }

        Ok(record)
    }
}

impl Drop for RecordDb {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            warn!("Failed to close {}: {}", self.path.display(), e);
        }
    }
}

/// An open session on a [`RecordDb`]
///
/// Dereferences to the database. Dropping the session commits and closes
/// the connection; use [`Session::close`] to observe commit errors.
#[derive(Debug)]
pub struct Session<'a> {
    db: &'a mut RecordDb,
}

impl Session<'_> {
    /// Commit and close, reporting any failure
    pub fn close(self) -> Result<()> {
        // Drop then finds the connection already gone
        self.db.disconnect()
    }
}

impl Deref for Session<'_> {
    type Target = RecordDb;

    fn deref(&self) -> &RecordDb {
        self.db
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.db.disconnect() {
            warn!("Failed to commit session on {}: {}", self.db.path.display(), e);
        }
    }
}

/// Async [`RecordStore`] over a SQLite file
///
/// Each call opens its own session on the blocking thread pool, so the file
/// is only held open for the duration of one operation.
///
/// # Example
///
/// ```rust,no_run
/// use homepixel_core::schema::NodeKind;
/// use homepixel_core::store::SqliteRecordStore;
/// use homepixel_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let kind = NodeKind::LightClapper;
///     let store = SqliteRecordStore::new(kind.default_db_file(), kind.schema()).await?;
///     store.ensure_table().await?;
///
///     for record in store.records().await? {
///         println!("{} {}", record.date, record.time);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    path: PathBuf,
    schema: NodeSchema,
}

impl SqliteRecordStore {
    /// Create a store, creating the parent directory if needed
    pub async fn new(path: impl AsRef<Path>, schema: NodeSchema) -> Result<Self> {
        schema.validate()?;
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(Self { path, schema })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside one session on the blocking pool
    async fn with_session<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&RecordDb) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        let schema = self.schema.clone();

        tokio::task::spawn_blocking(move || {
            let mut db = RecordDb::new(path, schema)?;
            let session = db.open()?;
            let out = f(&session)?;
            session.close()?;
            Ok(out)
        })
        .await
        .map_err(|e| Error::store(format!("SQLite task failed: {}", e)))?
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn ensure_table(&self) -> Result<()> {
        self.with_session(|db| {
            if !db.table_exists()? {
                db.create_table()?;
            }
            Ok(())
        })
        .await
    }

    async fn persist(&self, records: &[StoredRecord]) -> Result<PersistOutcome> {
        let records = records.to_vec();

        self.with_session(move |db| {
            let mut outcome = PersistOutcome::default();
            for record in &records {
                if db.record_exists(record)? {
                    outcome.duplicates += 1;
                } else {
                    db.add_record(record)?;
                    outcome.inserted += 1;
                }
            }
            Ok(outcome)
        })
        .await
    }

    async fn records(&self) -> Result<Vec<StoredRecord>> {
        self.with_session(|db| db.get_records()).await
    }
}
