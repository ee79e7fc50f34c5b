//! Core traits for HomePixel
//!
//! This module defines the abstract interfaces the loops are written against.
//!
//! - [`FeedSource`]: Read entries from a remote channel
//! - [`ChannelPublisher`]: Write a field-set to a remote channel
//! - [`RecordStore`]: Append-only persistence of validated records
//! - [`Sensor`], [`Actuator`], [`Notifier`]: Node hardware collaborators

pub mod channel;
pub mod hardware;
pub mod record_store;

pub use channel::{ChannelFields, ChannelPublisher, FeedSource, PublishResponse, GOOD_STATUS};
pub use hardware::{Actuator, Notifier, Sensor, SensorReading};
pub use record_store::{PersistOutcome, RecordStore};
