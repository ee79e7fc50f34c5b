// # ThingSpeak Channel
//
// This crate provides the ThingSpeak implementations of the HomePixel
// channel traits.
//
// ## Endpoints
//
// - Read everything: `GET {base}/channels/{feed}/feeds.json?api_key={read_key}`
// - Read the last n: `GET {base}/channels/{feed}/fields/1.json?results={n}`
//   (this endpoint only carries `field1` per entry)
// - Write: `POST {base}/update` with the fields and `key={write_key}`
//   form-encoded
//
// ## Architecture
//
// One request per call. No retries, no pagination, no caching; the client
// loop owns diffing and the node loop owns error reporting. Every request
// carries the configured timeout, so a hung request surfaces as a transport
// error.

use homepixel_core::config::{ChannelConfig, ClientConfig};
use homepixel_core::feed::{FeedEntry, FeedResponse};
use homepixel_core::traits::{ChannelFields, ChannelPublisher, FeedSource, PublishResponse};
use homepixel_core::{Error, Result};

use std::fmt;
use std::time::Duration;
use tracing::{debug, error};

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

/// Reads a ThingSpeak channel's feed
#[derive(Clone)]
pub struct ThingSpeakReader {
    base_url: String,
    feed_id: String,
    read_key: String,
    client: reqwest::Client,
}

impl ThingSpeakReader {
    /// Create a reader
    ///
    /// # Parameters
    ///
    /// - `channel`: Channel location and read key
    /// - `timeout`: Per-request timeout
    pub fn new(channel: &ChannelConfig, timeout: Duration) -> Result<Self> {
        channel.validate()?;
        if channel.feed_id.is_empty() {
            return Err(Error::config("Feed ID cannot be empty"));
        }

        Ok(Self {
            base_url: channel.base().to_string(),
            feed_id: channel.feed_id.clone(),
            read_key: channel.read_key.clone(),
            client: http_client(timeout)?,
        })
    }

    /// Create a reader for a client loop
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(&config.channel, config.http_timeout())
    }

    fn request(&self, limit: Option<u32>) -> reqwest::RequestBuilder {
        match limit {
            None => self
                .client
                .get(format!("{}/channels/{}/feeds.json", self.base_url, self.feed_id))
                .query(&[("api_key", &self.read_key)]),
            Some(n) => {
                let request = self
                    .client
                    .get(format!("{}/channels/{}/fields/1.json", self.base_url, self.feed_id))
                    .query(&[("results", n)]);
                if self.read_key.is_empty() {
                    request
                } else {
                    request.query(&[("api_key", &self.read_key)])
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl FeedSource for ThingSpeakReader {
    async fn fetch(&self, limit: Option<u32>) -> Result<Vec<FeedEntry>> {
        debug!("Reading channel {} (limit: {:?})", self.feed_id, limit);

        let response = self
            .request(limit)
            .send()
            .await
            .map_err(|e| Error::transport(format!("Request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(format!("HTTP error: {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Failed to read response: {}", e.without_url())))?;

        let feeds = FeedResponse::from_json(&body)?.feeds;
        debug!("Channel {} returned {} entries", self.feed_id, feeds.len());
        Ok(feeds)
    }

    fn source_name(&self) -> &'static str {
        "thingspeak"
    }
}

impl fmt::Debug for ThingSpeakReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThingSpeakReader")
            .field("base_url", &self.base_url)
            .field("feed_id", &self.feed_id)
            .field("read_key", &"<REDACTED>")
            .finish()
    }
}

/// Writes field-sets to a ThingSpeak channel
#[derive(Clone)]
pub struct ThingSpeakWriter {
    base_url: String,
    write_key: String,
    client: reqwest::Client,
}

impl ThingSpeakWriter {
    /// Create a writer
    ///
    /// An empty write key is accepted; ThingSpeak answers such writes with
    /// 400 Bad Request.
    pub fn new(channel: &ChannelConfig, timeout: Duration) -> Result<Self> {
        channel.validate()?;

        Ok(Self {
            base_url: channel.base().to_string(),
            write_key: channel.write_key.clone(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait::async_trait]
impl ChannelPublisher for ThingSpeakWriter {
    async fn publish(&self, fields: &ChannelFields) -> PublishResponse {
        let mut form: Vec<(&str, &str)> = fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        form.push(("key", self.write_key.as_str()));

        match self
            .client
            .post(format!("{}/update", self.base_url))
            .form(&form)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                debug!("Write to channel returned {}", status);
                PublishResponse::new(status.as_u16(), status.canonical_reason().unwrap_or_default())
            }
            Err(e) => {
                error!("Write to channel failed: {}", e.without_url());
                PublishResponse::unreachable()
            }
        }
    }
}

impl fmt::Debug for ThingSpeakWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThingSpeakWriter")
            .field("base_url", &self.base_url)
            .field("write_key", &"<REDACTED>")
            .finish()
    }
}
