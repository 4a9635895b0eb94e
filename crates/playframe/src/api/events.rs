use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Closed vocabulary of events exchanged between host page and guest game.
/// Wire names are snake_case (`game_over`, `play_again`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Ready,
    Wager,
    GameOver,
    PlayAgain,
    HapticFeedback,
    Error,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::Ready,
        EventType::Wager,
        EventType::GameOver,
        EventType::PlayAgain,
        EventType::HapticFeedback,
        EventType::Error,
    ];

    /// Wire name of this event type.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Ready => "ready",
            EventType::Wager => "wager",
            EventType::GameOver => "game_over",
            EventType::PlayAgain => "play_again",
            EventType::HapticFeedback => "haptic_feedback",
            EventType::Error => "error",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownEventType(s.to_string()))
    }
}

/// Payload of `game_over`. The score is forwarded as-is, no clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameOverData {
    pub score: f64,
}

/// Payload of `error`, either captured automatically or reported by the game.
///
/// Unknown fields supplied through `reportError` are kept in `extra` so an
/// arbitrary payload survives the trip to the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

impl ErrorData {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Interpret a loosely-typed error payload. Never fails: a bare string
    /// becomes the message, `null`/absent yields an empty report, and known
    /// fields with an unexpected type are kept verbatim in `extra`.
    pub fn from_payload(data: Option<Value>) -> Self {
        match data {
            None | Some(Value::Null) => Self::default(),
            Some(Value::String(message)) => Self::with_message(message),
            Some(Value::Object(fields)) => serde_json::from_value(Value::Object(fields.clone()))
                .unwrap_or_else(|_| Self::from_fields(fields)),
            Some(other) => Self::with_message(other.to_string()),
        }
    }

    fn from_fields(mut fields: Map<String, Value>) -> Self {
        let message = match fields.remove("message") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
        };
        Self {
            message,
            source: take_typed(&mut fields, "source"),
            lineno: take_typed(&mut fields, "lineno"),
            colno: take_typed(&mut fields, "colno"),
            error: fields.remove("error").filter(|v| !v.is_null()),
            extra: fields,
        }
    }
}

/// Remove and return `key` if it has the expected type; otherwise leave it.
fn take_typed<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = fields.get(key)?;
    if value.is_null() {
        fields.remove(key);
        return None;
    }
    let typed = T::deserialize(value).ok()?;
    fields.remove(key);
    Some(typed)
}

/// A protocol event: discriminant plus its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Ready,
    Wager,
    GameOver(GameOverData),
    PlayAgain,
    HapticFeedback,
    Error(ErrorData),
}

impl GameEvent {
    pub fn game_over(score: f64) -> Self {
        GameEvent::GameOver(GameOverData { score })
    }

    pub fn event_type(&self) -> EventType {
        match self {
            GameEvent::Ready => EventType::Ready,
            GameEvent::Wager => EventType::Wager,
            GameEvent::GameOver(_) => EventType::GameOver,
            GameEvent::PlayAgain => EventType::PlayAgain,
            GameEvent::HapticFeedback => EventType::HapticFeedback,
            GameEvent::Error(_) => EventType::Error,
        }
    }

    /// JSON payload for the wire. `None` for zero-payload events.
    pub fn data(&self) -> Option<Value> {
        match self {
            GameEvent::GameOver(data) => serde_json::to_value(data).ok(),
            GameEvent::Error(data) => serde_json::to_value(data).ok(),
            _ => None,
        }
    }

    /// Build an event from a wire discriminant and optional payload.
    /// Payloads on zero-payload events are ignored.
    pub fn from_parts(event_type: EventType, data: Option<Value>) -> Result<Self, ProtocolError> {
        let malformed = |source| ProtocolError::MalformedPayload { event_type, source };
        Ok(match event_type {
            EventType::Ready => GameEvent::Ready,
            EventType::Wager => GameEvent::Wager,
            EventType::PlayAgain => GameEvent::PlayAgain,
            EventType::HapticFeedback => GameEvent::HapticFeedback,
            EventType::GameOver => {
                let data = data.unwrap_or(Value::Null);
                GameEvent::GameOver(serde_json::from_value(data).map_err(malformed)?)
            }
            EventType::Error => GameEvent::Error(ErrorData::from_payload(data)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>().unwrap(), t);
        }
        assert_eq!(EventType::GameOver.to_string(), "game_over");
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "jump".parse::<EventType>().unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEventType(ref name) if name == "jump"));
    }

    #[test]
    fn game_over_keeps_zero_and_negative_scores() {
        for score in [0.0, -12.5, 1e9] {
            let event = GameEvent::game_over(score);
            assert_eq!(event.data(), Some(json!({ "score": score })));
        }
    }

    #[test]
    fn zero_payload_events_have_no_data() {
        assert_eq!(GameEvent::Ready.data(), None);
        assert_eq!(
            GameEvent::from_parts(EventType::Wager, Some(json!({ "ignored": true }))).unwrap(),
            GameEvent::Wager
        );
    }

    #[test]
    fn game_over_without_score_is_malformed() {
        let err = GameEvent::from_parts(EventType::GameOver, None).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedPayload { event_type: EventType::GameOver, .. }
        ));
    }

    #[test]
    fn error_payload_accepts_string_and_extra_fields() {
        let event = GameEvent::from_parts(EventType::Error, Some(json!("boom"))).unwrap();
        assert_eq!(event, GameEvent::Error(ErrorData::with_message("boom")));

        let data = ErrorData::from_payload(Some(json!({
            "message": "bad level",
            "level": 3
        })));
        assert_eq!(data.message, "bad level");
        assert_eq!(data.extra.get("level"), Some(&json!(3)));
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({ "message": "bad level", "level": 3 })
        );
    }

    #[test]
    fn mistyped_error_fields_are_kept_not_flattened() {
        let data = ErrorData::from_payload(Some(json!({
            "message": "level failed",
            "lineno": -1,
            "colno": 4,
            "code": 7
        })));
        assert_eq!(data.message, "level failed");
        assert_eq!(data.lineno, None);
        assert_eq!(data.colno, Some(4));
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({ "message": "level failed", "lineno": -1, "colno": 4, "code": 7 })
        );
    }

    #[test]
    fn non_string_message_is_stringified_alone() {
        let data = ErrorData::from_payload(Some(json!({
            "message": { "text": "nested" },
            "source": "game.js"
        })));
        assert_eq!(data.message, r#"{"text":"nested"}"#);
        assert_eq!(data.source.as_deref(), Some("game.js"));
        assert!(data.extra.is_empty());
    }
}
