//! REST Interface (ARI) event adapter

use serde_json::Value;

use crate::adapter::ProtocolAdapter;
use crate::error::ProtocolError;
use crate::event::Event;

/// Envelope source name for ARI events
pub const SOURCE: &str = "asterisk-ari";

/// User agent sent with ARI webhook deliveries
pub const USER_AGENT: &str = "Asterisk-Webhook-Forwarder/1.0";

/// Field carrying the event type
pub const TYPE_FIELD: &str = "type";

/// Parse one event-stream message
///
/// The whole object becomes the attribute map, so `type` is present both as
/// the event type and inside the attributes.
pub fn parse_message(message: &str) -> Result<Event, ProtocolError> {
    let Value::Object(object) = serde_json::from_str::<Value>(message)? else {
        return Err(ProtocolError::NotAnObject);
    };

    let event_type = match object.get(TYPE_FIELD) {
        Some(Value::String(t)) if !t.is_empty() => t.clone(),
        _ => return Err(ProtocolError::MissingEventType),
    };

    Ok(Event::new(event_type, object))
}

/// Adapter for the JSON event stream
///
/// The stream is already scoped to the registered application, so every
/// parsed event is forwarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct AriAdapter;

impl ProtocolAdapter for AriAdapter {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn user_agent(&self) -> &'static str {
        USER_AGENT
    }

    fn parse(&self, frame: &str) -> Result<Event, ProtocolError> {
        parse_message(frame)
    }

    fn should_forward(&self, _event: &Event) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_stasis_start() {
        let event = parse_message(r#"{"type":"StasisStart","channel":{"id":"1"}}"#).unwrap();

        assert_eq!(event.event_type(), "StasisStart");
        assert_eq!(
            Value::Object(event.attributes().clone()),
            json!({"type": "StasisStart", "channel": {"id": "1"}})
        );
    }

    #[test]
    fn test_malformed_json_is_recoverable() {
        let err = parse_message(r#"{"type": "StasisStart""#).unwrap_err();

        assert!(matches!(err, ProtocolError::MalformedJson(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_missing_or_non_string_type() {
        for message in [
            r#"{"channel":{"id":"1"}}"#,
            r#"{"type":42}"#,
            r#"{"type":null}"#,
            r#"{"type":""}"#,
        ] {
            let err = parse_message(message).unwrap_err();
            assert!(
                matches!(err, ProtocolError::MissingEventType),
                "unexpected error for {message}: {err:?}"
            );
        }
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            parse_message(r#"["StasisStart"]"#),
            Err(ProtocolError::NotAnObject)
        ));
    }

    #[test]
    fn test_adapter_forwards_everything() {
        let adapter = AriAdapter;
        let event = adapter
            .parse(r#"{"type":"SomethingNobodyListedEvent"}"#)
            .unwrap();

        assert!(adapter.should_forward(&event));
        assert_eq!(adapter.user_agent(), "Asterisk-Webhook-Forwarder/1.0");
    }
}
