//! Configuration types for HomePixel
//!
//! This module defines the configuration structures for the client loop, the
//! node loop and the remote channel they share.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::schema::NodeKind;

/// Remote channel location and credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// API root (e.g., "https://api.thingspeak.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Channel (feed) identifier
    #[serde(default)]
    pub feed_id: String,

    /// Key for reading the channel
    #[serde(default)]
    pub read_key: String,

    /// Key for writing to the channel
    #[serde(default)]
    pub write_key: String,
}

impl ChannelConfig {
    /// Create a channel configuration for the default API root
    pub fn new(feed_id: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            feed_id: feed_id.into(),
            read_key: String::new(),
            write_key: String::new(),
        }
    }

    /// Set the API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the read key
    pub fn with_read_key(mut self, key: impl Into<String>) -> Self {
        self.read_key = key.into();
        self
    }

    /// Set the write key
    pub fn with_write_key(mut self, key: impl Into<String>) -> Self {
        self.write_key = key.into();
        self
    }

    /// API root without a trailing slash
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Validate the channel configuration
    ///
    /// Keys may be empty; the channel answers such requests itself.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.base_url.is_empty() {
            return Err(crate::Error::config("Channel base URL cannot be empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Channel base URL must be http(s): {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("base_url", &self.base_url)
            .field("feed_id", &self.feed_id)
            .field("read_key", &redact(&self.read_key))
            .field("write_key", &redact(&self.write_key))
            .finish()
    }
}

fn redact(key: &str) -> &'static str {
    if key.is_empty() { "" } else { "<REDACTED>" }
}

/// Client loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Node type whose channel is mirrored
    pub node_kind: NodeKind,

    /// Channel to read
    pub channel: ChannelConfig,

    /// SQLite file (defaults to the node type's file name)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Sleep between cycles in seconds (defaults per node type)
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,

    /// Only fetch the last `n` entries
    ///
    /// Unset fetches the whole channel each cycle.
    #[serde(default)]
    pub fetch_limit: Option<u32>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Capacity of the client event channel
    ///
    /// When full, new events are dropped with a warning.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ClientConfig {
    /// Create a client configuration with defaults
    pub fn new(node_kind: NodeKind, channel: ChannelConfig) -> Self {
        Self {
            node_kind,
            channel,
            database_path: None,
            poll_interval_secs: None,
            fetch_limit: None,
            http_timeout_secs: default_http_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.channel.validate()?;

        if self.channel.feed_id.is_empty() {
            return Err(crate::Error::config("Feed ID cannot be empty"));
        }
        if self.poll_interval_secs == Some(0) {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.fetch_limit == Some(0) {
            return Err(crate::Error::config("Fetch limit must be > 0"));
        }
        if self.http_timeout_secs == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(crate::Error::config("Database path cannot be empty"));
            }
        }

        Ok(())
    }

    /// Effective SQLite file
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.node_kind.default_db_file()))
    }

    /// Effective sleep between cycles
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.poll_interval_secs
                .unwrap_or_else(|| default_poll_interval_secs(self.node_kind)),
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Node loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node type
    pub node_kind: NodeKind,

    /// Identifier published in the node-id field (e.g., "lightclapper_1")
    pub node_id: NodeId,

    /// Location published in the location field
    pub location: String,

    /// Whether state changes are published to the channel
    #[serde(default = "default_write_enabled")]
    pub write_enabled: bool,

    /// Fan switches on strictly above this temperature
    #[serde(default = "default_temp_threshold")]
    pub temp_threshold: f64,
}

impl NodeConfig {
    /// Create a node configuration with defaults
    pub fn new(node_kind: NodeKind, number: u32, location: impl Into<String>) -> Self {
        Self {
            node_kind,
            node_id: NodeId::new(node_kind, number),
            location: location.into(),
            write_enabled: default_write_enabled(),
            temp_threshold: default_temp_threshold(),
        }
    }

    /// Enable or disable publishing
    pub fn with_write_enabled(mut self, enabled: bool) -> Self {
        self.write_enabled = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.location.is_empty() {
            return Err(crate::Error::config("Node location cannot be empty"));
        }
        if self.node_id.as_str().is_empty() {
            return Err(crate::Error::config("Node ID cannot be empty"));
        }
        if !self.temp_threshold.is_finite() {
            return Err(crate::Error::config("Temperature threshold must be finite"));
        }
        Ok(())
    }
}

/// Identifier a node publishes with its readings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// `<kind>_<number>`, e.g. `lightclapper_1`
    pub fn new(kind: NodeKind, number: u32) -> Self {
        Self(format!("{}_{}", kind.name(), number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_base_url() -> String {
    "https://api.thingspeak.com".to_string()
}

/// Sleep between client cycles for a node type
pub fn default_poll_interval_secs(kind: NodeKind) -> u64 {
    match kind {
        NodeKind::LightClapper | NodeKind::SecuritySystem => 5,
        NodeKind::TempSensor => 10,
    }
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    100
}

fn default_write_enabled() -> bool {
    true
}

fn default_temp_threshold() -> f64 {
    25.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults_follow_node_kind() {
        let config = ClientConfig::new(NodeKind::TempSensor, ChannelConfig::new("1150656"));

        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.database_path(), PathBuf::from("tempsensor.db"));
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_client_rejects_missing_feed_id() {
        let config = ClientConfig::new(NodeKind::LightClapper, ChannelConfig::new(""));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_rejects_zero_interval() {
        let mut config = ClientConfig::new(NodeKind::LightClapper, ChannelConfig::new("1"));
        config.poll_interval_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_rejects_non_http_url() {
        let channel = ChannelConfig::new("1").with_base_url("ftp://example.com");
        assert!(channel.validate().is_err());
    }

    #[test]
    fn test_channel_debug_redacts_keys() {
        let channel = ChannelConfig::new("1")
            .with_read_key("READSECRET")
            .with_write_key("WRITESECRET");
        let debug = format!("{:?}", channel);

        assert!(!debug.contains("READSECRET"));
        assert!(!debug.contains("WRITESECRET"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn test_node_id_format() {
        assert_eq!(NodeId::new(NodeKind::LightClapper, 1).as_str(), "lightclapper_1");
        assert_eq!(
            NodeId::new(NodeKind::SecuritySystem, 12).to_string(),
            "securitysystem_12"
        );
    }

    #[test]
    fn test_node_config_deserializes_with_defaults() {
        let json = r#"{"node_kind":"temp_sensor","node_id":"tempsensor_3","location":"attic"}"#;
        let config: NodeConfig = serde_json::from_str(json).unwrap();

        assert!(config.write_enabled);
        assert_eq!(config.temp_threshold, 25.0);
        assert_eq!(config.node_id.as_str(), "tempsensor_3");
        assert!(config.validate().is_ok());
    }
}
