//! Manager Interface (AMI) event adapter

use serde_json::Value;

use crate::adapter::ProtocolAdapter;
use crate::classify;
use crate::error::ProtocolError;
use crate::event::{Attributes, Event};

/// Envelope source name for AMI events
pub const SOURCE: &str = "asterisk-ami";

/// User agent sent with AMI webhook deliveries
pub const USER_AGENT: &str = "Asterisk-AMI-Webhook-Forwarder/1.0";

/// Key carrying the event type
pub const EVENT_KEY: &str = "Event";

/// Substring a block must contain to be treated as an event
pub const EVENT_MARKER: &str = "Event:";

/// Separator between key and value
const SEPARATOR: &str = ": ";

/// Response line of an accepted login
pub const AUTH_ACCEPTED: &str = "Message: Authentication accepted";

/// Response line of a rejected login
pub const AUTH_FAILED: &str = "Message: Authentication failed";

/// How the manager answered a `Login` action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Explicit acceptance
    Accepted,
    /// Explicit rejection
    Rejected,
    /// Response ended without either marker; treated as success
    Implicit,
}

/// Classify a login response block
///
/// The first marker line wins. A block carrying neither marker counts as
/// success, which existing deployments rely on.
pub fn login_outcome(block: &str) -> LoginOutcome {
    for line in block.lines().map(str::trim) {
        if line.contains(AUTH_ACCEPTED) {
            return LoginOutcome::Accepted;
        }
        if line.contains(AUTH_FAILED) {
            return LoginOutcome::Rejected;
        }
    }
    LoginOutcome::Implicit
}

/// Whether a raw block looks like an event at all
pub fn is_event_block(block: &str) -> bool {
    !block.is_empty() && block.contains(EVENT_MARKER)
}

/// Parse a block of `Key: Value` lines
///
/// Lines are split on the first `": "`, so values may contain colons. Lines
/// without the separator are skipped and later duplicates overwrite earlier
/// ones. A block without an `Event` key yields an empty event type.
pub fn parse_block(block: &str) -> Event {
    let mut attributes = Attributes::new();
    let mut event_type = String::new();

    for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((key, value)) = line.split_once(SEPARATOR) else {
            continue;
        };
        if key == EVENT_KEY {
            event_type = value.to_string();
        }
        attributes.insert(key.to_string(), Value::String(value.to_string()));
    }

    Event::new(event_type, attributes)
}

/// Adapter for the line-oriented manager protocol
///
/// AMI also carries administrative chatter, so only allow-set events are
/// forwarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmiAdapter;

impl ProtocolAdapter for AmiAdapter {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn user_agent(&self) -> &'static str {
        USER_AGENT
    }

    fn parse(&self, frame: &str) -> Result<Event, ProtocolError> {
        Ok(parse_block(frame))
    }

    fn should_forward(&self, event: &Event) -> bool {
        classify::should_forward(event.event_type())
    }
}
