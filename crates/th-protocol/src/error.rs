//! Protocol error types

use thiserror::Error;

/// Errors raised while framing or parsing source traffic
///
/// Everything except [`ProtocolError::LineTooLong`] and
/// [`ProtocolError::Io`] is frame-level: the frame is dropped and reading
/// continues.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A single line exceeded the codec limit
    #[error("Line too long: {size} bytes exceeds maximum of {max} bytes")]
    LineTooLong { size: usize, max: usize },

    /// Action cannot be encoded on the wire
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Frame payload is not valid JSON
    #[error("Malformed JSON frame: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// Frame payload is valid JSON but not an object
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// Frame carries no usable event type
    #[error("Frame has no event type")]
    MissingEventType,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the error only affects the current frame
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedJson(_) | Self::NotAnObject | Self::MissingEventType
        )
    }
}
