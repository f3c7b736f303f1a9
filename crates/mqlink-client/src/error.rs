//! Client error types.

use std::io;

use mqlink_core::ConnackCode;
use thiserror::Error;

/// Client error type.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] mqlink_core::ProtocolError),

    #[error("Connection refused: {0}")]
    ConnectionRefused(ConnackCode),

    #[error("Not connected")]
    NotConnected,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid QoS: {0} (only 0 and 1 are supported)")]
    InvalidQoS(u8),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to publish to '{topic}': {source}")]
    Publish {
        topic: String,
        #[source]
        source: Box<ClientError>,
    },

    #[error("Failed to subscribe to '{topic}': {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: Box<ClientError>,
    },

    #[error("Failed to unsubscribe from '{topic}': {source}")]
    Unsubscribe {
        topic: String,
        #[source]
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// True for errors caused by the caller's arguments rather than the link.
    pub fn is_input_error(&self) -> bool {
        matches!(self, ClientError::InvalidQoS(_) | ClientError::InvalidInput(_))
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(e: config::ConfigError) -> Self {
        ClientError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
