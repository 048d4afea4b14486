//! Protocol adapter abstraction

use crate::error::ProtocolError;
use crate::event::Event;

/// Turns raw frames of one source protocol into canonical events
///
/// Implementations are stateless; the variant is chosen once when a session
/// is set up, never per frame.
pub trait ProtocolAdapter: Send + Sync {
    /// Constant `source` value of the delivery envelope
    fn source(&self) -> &'static str;

    /// User agent for webhook requests carrying this adapter's events
    fn user_agent(&self) -> &'static str;

    /// Parse a single frame
    ///
    /// Errors are frame-level: the caller drops the frame and keeps reading.
    fn parse(&self, frame: &str) -> Result<Event, ProtocolError>;

    /// Whether the event should be delivered to the webhook
    fn should_forward(&self, event: &Event) -> bool;
}
