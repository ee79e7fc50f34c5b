//! Error types for HomePixel
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for HomePixel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for HomePixel
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP/network failure talking to the remote channel
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed JSON or an unparseable timestamp
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing or invalid field in a record
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store operation invoked without an open connection
    #[error("Invalid state: {0}")]
    State(String),

    /// The blocking task running a store session failed
    #[error("Record store error: {0}")]
    Store(String),

    /// SQLite errors
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sensor or actuator failure
    #[error("Hardware error: {0}")]
    Hardware(String),
}

impl Error {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Create a record store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a hardware error
    pub fn hardware(msg: impl Into<String>) -> Self {
        Self::Hardware(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_errors_convert() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::Sqlite(_)));
    }

    #[test]
    fn display_includes_kind() {
        let err = Error::state("create_table called outside an open connection");
        assert_eq!(
            err.to_string(),
            "Invalid state: create_table called outside an open connection"
        );
    }
}
