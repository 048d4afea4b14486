//! Core error types for Telehook
//!
//! Errors are grouped by how far their effect reaches: connect errors stop
//! the process at startup, stream errors end the current session, and
//! delivery errors only affect a single event.

use std::path::PathBuf;
use std::time::Duration;

use th_protocol::ProtocolError;
use thiserror::Error;

use crate::session::SessionState;

/// Top-level error type for Telehook
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connect or authentication error
    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    /// Session stream error
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

/// Errors while establishing a session
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Transport could not be established
    #[error("Failed to connect to {address}: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Transport did not come up in time
    #[error("Timed out connecting to {address} after {timeout:?}")]
    TimedOut { address: String, timeout: Duration },

    /// Credentials were rejected by the manager interface
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Peer went away or misbehaved during the handshake
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Application registration answered with an unexpected status
    #[error("Application registration rejected with status {status}")]
    RegistrationRejected { status: u16 },

    /// Application registration request failed
    #[error("Application registration failed: {0}")]
    Registration(#[source] reqwest::Error),

    /// Event stream WebSocket could not be opened
    #[error("WebSocket connect failed: {0}")]
    WebSocket(String),

    /// Source address could not be turned into a URL
    #[error("Invalid source address: {0}")]
    InvalidAddress(#[from] ConfigError),

    /// Session was asked to move to a state it cannot reach
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
}

/// Errors that end an active session
#[derive(Error, Debug)]
pub enum StreamError {
    /// Nothing was read within the read deadline
    #[error("No data received for {0:?}")]
    Timeout(Duration),

    /// Transport I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream-level protocol violation
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// WebSocket failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Peer ended the stream
    #[error("Event stream closed by peer")]
    Closed,
}

/// Errors from a single webhook delivery
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Envelope could not be serialized
    #[error("Failed to serialize envelope: {0}")]
    Serialize(String),

    /// Request failed before a response arrived (connect, timeout, reset)
    #[error("Webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Webhook answered with a non-2xx status
    #[error("Webhook returned non-success status: {0}")]
    Status(u16),
}

impl DeliveryError {
    /// HTTP status of the failed delivery, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}
