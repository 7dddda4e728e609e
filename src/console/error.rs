//! Console error types

use thiserror::Error;

/// Errors returned synchronously by console session operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Invalid connection parameters: {0}")]
    Configuration(String),

    #[error("Not connected to the node")]
    NotConnected,

    #[error("Server is not running")]
    ServerNotRunning,

    #[error("Server is already running")]
    ServerAlreadyRunning,

    #[error("A power action is already in progress")]
    PowerActionPending,

    #[error("Command is empty")]
    EmptyCommand,

    #[error("Console session is already open")]
    AlreadyOpen,

    #[error("Console session has been closed")]
    SessionClosed,

    #[error("Failed to resolve server: {0}")]
    Resolve(String),

    #[error("Failed to encode frame: {0}")]
    Encode(String),
}

/// Errors raised by the transport channel
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Channel is not open")]
    NotConnected,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Invalid node URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Malformed inbound frame
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,
}

// Make ConsoleError serializable for UI shells
impl serde::Serialize for ConsoleError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<crate::api::ApiError> for ConsoleError {
    fn from(err: crate::api::ApiError) -> Self {
        ConsoleError::Resolve(err.to_string())
    }
}

impl From<TransportError> for ConsoleError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidUrl(msg) => ConsoleError::Configuration(msg),
            TransportError::Encode(e) => ConsoleError::Encode(e.to_string()),
            TransportError::NotConnected | TransportError::Connect(_) => ConsoleError::NotConnected,
        }
    }
}
