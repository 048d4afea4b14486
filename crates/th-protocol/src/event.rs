//! Canonical event model

use serde_json::{Map, Value};

/// Ordered attribute map of an event
///
/// Keys keep their first-seen position; re-inserting a key replaces the
/// value in place.
pub type Attributes = Map<String, Value>;

/// One occurrence reported by the event source, independent of the protocol
/// it arrived on
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: String,
    attributes: Attributes,
}

impl Event {
    /// Create a new event
    pub fn new(event_type: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            event_type: event_type.into(),
            attributes,
        }
    }

    /// Discriminant used for classification and the envelope's `event_type`
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// All key/value pairs observed in the frame
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Look up a single attribute as a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}
