// # Channel Traits
//
// Defines the read and write sides of a remote channel.
//
// ## Implementations
//
// - ThingSpeak: `homepixel-thingspeak` crate
//
// ## Usage
//
// ```rust,ignore
// use homepixel_core::traits::{ChannelPublisher, FeedSource};
//
// #[tokio::main]
// async fn main() -> homepixel_core::Result<()> {
//     let reader = /* FeedSource implementation */;
//     let writer = /* ChannelPublisher implementation */;
//
//     // Everything the channel holds
//     let feeds = reader.fetch(None).await?;
//
//     // Push a reading
//     let mut fields = ChannelFields::new();
//     fields.insert("field1".into(), "my_room".into());
//     let response = writer.publish(&fields).await;
//     if !response.is_success() {
//         tracing::error!("write rejected: {:?}", response);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::feed::FeedEntry;

/// HTTP status a successful channel write returns
pub const GOOD_STATUS: u16 = 200;

/// Positional field name (`field1`..) to form value
pub type ChannelFields = BTreeMap<String, String>;

/// Raw outcome of a channel write
///
/// Both parts are `None` when the request never reached the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishResponse {
    /// HTTP status code
    pub status: Option<u16>,
    /// HTTP reason phrase
    pub reason: Option<String>,
}

impl PublishResponse {
    /// Response received from the server
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            reason: Some(reason.into()),
        }
    }

    /// The request did not complete
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Whether the channel accepted the write
    pub fn is_success(&self) -> bool {
        self.status == Some(GOOD_STATUS)
    }
}

/// Read side of a remote channel
///
/// Implementations issue exactly one request per call. They do not retry,
/// paginate, or remember what they returned last time; diffing is owned by
/// the client loop.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the channel's entries in arrival order
    ///
    /// # Parameters
    ///
    /// - `limit`: Return only the last `n` entries when set
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<FeedEntry>)`: Entries, oldest first (possibly empty)
    /// - `Err(Error::Transport)`: The request failed or returned a non-success status
    /// - `Err(Error::Parse)`: The body was not a feed response
    async fn fetch(&self, limit: Option<u32>) -> Result<Vec<FeedEntry>, crate::Error>;

    /// Name used in logs
    fn source_name(&self) -> &'static str;
}

/// Write side of a remote channel
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    /// Post one field-set to the channel
    ///
    /// Never fails: a non-2xx reply is returned as-is for the caller to
    /// check, and a connection failure is logged and reported as
    /// [`PublishResponse::unreachable`].
    async fn publish(&self, fields: &ChannelFields) -> PublishResponse;
}
