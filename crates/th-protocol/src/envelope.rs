//! Webhook delivery envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{Attributes, Event};

/// JSON document POSTed to the webhook for one event
///
/// ```json
/// {"source": "asterisk-ami", "event_type": "Hangup", "timestamp": "2024-05-01T12:00:00Z", "data": {...}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEnvelope {
    /// Adapter that produced the event
    pub source: String,
    /// Copy of the event type
    pub event_type: String,
    /// Dispatch time, not the source's own timestamp
    pub timestamp: DateTime<Utc>,
    /// Copy of the event attributes
    pub data: Attributes,
}

impl DeliveryEnvelope {
    /// Build an envelope stamped with the current time
    pub fn new(source: &str, event: &Event) -> Self {
        Self::at(source, event, Utc::now())
    }

    /// Build an envelope with an explicit timestamp
    pub fn at(source: &str, event: &Event, timestamp: DateTime<Utc>) -> Self {
        Self {
            source: source.to_string(),
            event_type: event.event_type().to_string(),
            timestamp,
            data: event.attributes().clone(),
        }
    }
}
