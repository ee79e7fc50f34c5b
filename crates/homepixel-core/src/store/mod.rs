// # Record Stores
//
// Implementations of [`RecordStore`](crate::traits::RecordStore).

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::{RecordDb, Session, SqliteRecordStore};
