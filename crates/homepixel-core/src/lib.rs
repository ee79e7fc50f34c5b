// # homepixel-core
//
// Core library for the HomePixel home-automation system.
//
// ## Architecture Overview
//
// Each node type (light clapper, security system, temperature sensor) owns a
// remote channel. Nodes publish their state to it; a client mirrors it into
// a local SQLite table.
//
// - **FeedSource**: Trait for reading a remote channel
// - **ChannelPublisher**: Trait for writing to a remote channel
// - **RecordStore**: Trait for the local, append-only table
// - **ChannelClient**: Poll-diff-persist loop (channel -> table)
// - **NodeLoop**: Sensor/actuator loop (hardware -> channel)
// - **NodeSchema**: Per-node-type column layout driving parsing, SQL and
//   publishing
//
// ## Design Principles
//
// 1. **One generic pipeline**: node types differ only in their schema
// 2. **Idempotency**: a record is stored at most once, however often it is fetched
// 3. **Library-First**: the daemon is a thin shell over this crate

pub mod traits;
pub mod client;
pub mod node;
pub mod config;
pub mod error;
pub mod feed;
pub mod schema;
pub mod store;

// Re-export core types for convenience
pub use traits::{ChannelPublisher, FeedSource, RecordStore};
pub use client::{ChannelClient, ClientEvent, ClientState};
pub use node::{NodeLoop, NodeTiming};
pub use config::{ChannelConfig, ClientConfig, NodeConfig, NodeId};
pub use error::{Error, Result};
pub use feed::{FeedEntry, parse_entry};
pub use schema::{NodeKind, NodeSchema, StoredRecord};
pub use store::{MemoryRecordStore, SqliteRecordStore};
