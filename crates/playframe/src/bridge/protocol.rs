//! postMessage envelope shared by host and guest.
//! Must stay in sync with any hand-written guest code that talks to the host.
//!
//! Wire format (JSON):
//! ```text
//! {
//!   "type": "game_event",
//!   "event": { "type": "<event type>", "data": { ... } }   // data omitted when empty
//! }
//! ```
//!
//! The channel is shared with unrelated platform messages, so anything whose
//! outer `type` is not `game_event` is reported as [`ProtocolError::Foreign`]
//! and dropped by both sides without logging.

use serde_json::{json, Map, Value};

use crate::api::events::{EventType, GameEvent};
use crate::error::ProtocolError;

/// Outer `type` marking a protocol message.
pub const ENVELOPE_TYPE: &str = "game_event";

/// Anything that accepts a posted message with an open target origin.
///
/// No origin check is made at this layer; isolation comes from the iframe
/// sandbox.
pub trait MessageTarget {
    fn post_message(&self, message: &Value);
}

/// Wrap an event in its envelope.
pub fn encode(event: &GameEvent) -> Value {
    let mut inner = Map::new();
    inner.insert("type".to_string(), json!(event.event_type().as_str()));
    if let Some(data) = event.data() {
        inner.insert("data".to_string(), data);
    }
    json!({ "type": ENVELOPE_TYPE, "event": Value::Object(inner) })
}

/// Unwrap an envelope into a typed event.
pub fn decode(message: &Value) -> Result<GameEvent, ProtocolError> {
    if message.get("type").and_then(Value::as_str) != Some(ENVELOPE_TYPE) {
        return Err(ProtocolError::Foreign);
    }
    let event = message
        .get("event")
        .and_then(Value::as_object)
        .ok_or(ProtocolError::MalformedEnvelope)?;
    let event_type: EventType = event
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MalformedEnvelope)?
        .parse()?;
    let data = event.get("data").filter(|d| !d.is_null()).cloned();
    GameEvent::from_parts(event_type, data)
}

/// Log a decode failure at the level its taxonomy calls for.
pub(crate) fn trace_rejected(side: &str, err: &ProtocolError) {
    match err {
        ProtocolError::Foreign => {}
        other => log::debug!("{side}: dropping message: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::events::ErrorData;

    #[test]
    fn zero_payload_envelope_has_no_data_field() {
        assert_eq!(
            encode(&GameEvent::Ready),
            json!({ "type": "game_event", "event": { "type": "ready" } })
        );
    }

    #[test]
    fn game_over_envelope_carries_score() {
        assert_eq!(
            encode(&GameEvent::game_over(-3.0)),
            json!({ "type": "game_event", "event": { "type": "game_over", "data": { "score": -3.0 } } })
        );
    }

    #[test]
    fn every_event_type_decodes_back() {
        let events = [
            GameEvent::Ready,
            GameEvent::Wager,
            GameEvent::game_over(0.0),
            GameEvent::PlayAgain,
            GameEvent::HapticFeedback,
            GameEvent::Error(ErrorData::with_message("oops")),
        ];
        for event in events {
            assert_eq!(decode(&encode(&event)).unwrap(), event);
        }
    }

    #[test]
    fn foreign_messages_are_flagged() {
        for message in [
            json!({ "type": "webpackOk" }),
            json!("game_event"),
            json!(null),
            json!({ "event": { "type": "ready" } }),
        ] {
            assert!(matches!(decode(&message), Err(ProtocolError::Foreign)));
        }
    }

    #[test]
    fn null_data_counts_as_absent() {
        let message = json!({ "type": "game_event", "event": { "type": "play_again", "data": null } });
        assert_eq!(decode(&message).unwrap(), GameEvent::PlayAgain);
    }

    #[test]
    fn malformed_envelopes_are_distinguished() {
        let missing_event = json!({ "type": "game_event" });
        assert!(matches!(decode(&missing_event), Err(ProtocolError::MalformedEnvelope)));

        let unknown = json!({ "type": "game_event", "event": { "type": "level_up" } });
        assert!(matches!(decode(&unknown), Err(ProtocolError::UnknownEventType(_))));
    }
}
