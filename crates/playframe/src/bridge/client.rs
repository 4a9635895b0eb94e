use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{json, Value};

use crate::api::events::{ErrorData, EventType, GameEvent};
use crate::bridge::protocol::{self, MessageTarget};

type Listener = Rc<dyn Fn(&GameEvent)>;

/// An uncaught exception as seen by the guest's global error handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UncaughtError {
    pub message: String,
    pub source: Option<String>,
    pub lineno: Option<u32>,
    pub colno: Option<u32>,
    pub error: Option<Value>,
}

/// Reason attached to an unhandled promise rejection.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// The promise rejected with an `Error` object.
    Error { message: String, error: Value },
    /// Anything else, already stringified.
    Other(String),
}

/// Guest-side end of the protocol, one per guest document.
///
/// Every outbound call becomes exactly one envelope posted to the embedding
/// parent. Without a parent (not embedded) sends are no-ops.
pub struct GuestSdk<P> {
    parent: Option<P>,
    listeners: RefCell<HashMap<EventType, Vec<Listener>>>,
}

impl<P: MessageTarget> GuestSdk<P> {
    pub fn new(parent: Option<P>) -> Self {
        Self {
            parent,
            listeners: RefCell::new(HashMap::new()),
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.parent.is_some()
    }

    /// The game finished initializing.
    pub fn ready(&self) -> bool {
        self.send(&GameEvent::Ready)
    }

    /// The player wants to start a wagered session.
    pub fn wager(&self) -> bool {
        self.send(&GameEvent::Wager)
    }

    pub fn game_over(&self, score: f64) -> bool {
        self.send(&GameEvent::game_over(score))
    }

    /// The game reset itself after a game over.
    pub fn play_again(&self) -> bool {
        self.send(&GameEvent::PlayAgain)
    }

    pub fn haptic_feedback(&self) -> bool {
        self.send(&GameEvent::HapticFeedback)
    }

    /// Forward an arbitrary error payload.
    pub fn report_error(&self, data: Value) -> bool {
        self.send(&GameEvent::Error(ErrorData::from_payload(Some(data))))
    }

    /// Global error handler hook.
    pub fn capture_exception(&self, uncaught: UncaughtError) -> bool {
        let message = if uncaught.message.is_empty() {
            "Unknown error".to_string()
        } else {
            uncaught.message
        };
        self.send(&GameEvent::Error(ErrorData {
            message,
            source: uncaught.source,
            lineno: uncaught.lineno,
            colno: uncaught.colno,
            error: uncaught.error,
            ..ErrorData::default()
        }))
    }

    /// Unhandled-rejection hook. Non-`Error` reasons are wrapped the way
    /// `new Error(String(reason))` would wrap them.
    pub fn capture_rejection(&self, reason: RejectionReason) -> bool {
        let (message, error) = match reason {
            RejectionReason::Error { message, error } => (message, error),
            RejectionReason::Other(text) => {
                let error = json!({ "name": "Error", "message": text });
                (text, error)
            }
        };
        self.send(&GameEvent::Error(ErrorData {
            message,
            error: Some(error),
            ..ErrorData::default()
        }))
    }

    /// Subscribe to events pushed down by the host.
    pub fn on<F>(&self, event_type: EventType, listener: F)
    where
        F: Fn(&GameEvent) + 'static,
    {
        self.listeners
            .borrow_mut()
            .entry(event_type)
            .or_default()
            .push(Rc::new(listener));
    }

    /// Dispatch one inbound message. Returns the number of listeners invoked.
    pub fn handle_message(&self, message: &Value) -> usize {
        let event = match protocol::decode(message) {
            Ok(event) => event,
            Err(err) => {
                protocol::trace_rejected("guest", &err);
                return 0;
            }
        };
        let listeners = self
            .listeners
            .borrow()
            .get(&event.event_type())
            .cloned()
            .unwrap_or_default();
        for listener in &listeners {
            listener(&event);
        }
        listeners.len()
    }

    fn send(&self, event: &GameEvent) -> bool {
        match &self.parent {
            Some(parent) => {
                parent.post_message(&protocol::encode(event));
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Clone, Default)]
    struct Parent(Rc<RefCell<Vec<Value>>>);

    impl MessageTarget for Parent {
        fn post_message(&self, message: &Value) {
            self.0.borrow_mut().push(message.clone());
        }
    }

    fn embedded() -> (GuestSdk<Parent>, Parent) {
        let parent = Parent::default();
        (GuestSdk::new(Some(parent.clone())), parent)
    }

    #[test]
    fn each_call_posts_exactly_one_envelope() {
        let (sdk, parent) = embedded();
        sdk.ready();
        sdk.wager();
        sdk.game_over(10.0);
        sdk.play_again();
        sdk.haptic_feedback();
        sdk.report_error(json!({ "message": "x" }));

        let sent = parent.0.borrow();
        let types: Vec<&str> = sent
            .iter()
            .map(|m| {
                assert_eq!(m["type"], "game_event");
                m["event"]["type"].as_str().unwrap()
            })
            .collect();
        assert_eq!(
            types,
            ["ready", "wager", "game_over", "play_again", "haptic_feedback", "error"]
        );
    }

    #[test]
    fn game_over_score_is_not_clamped() {
        for score in [0.0, -5.0, 123456.75] {
            let (sdk, parent) = embedded();
            sdk.game_over(score);
            assert_eq!(parent.0.borrow()[0]["event"]["data"]["score"], json!(score));
        }
    }

    #[test]
    fn not_embedded_sends_nothing() {
        let sdk = GuestSdk::<Parent>::new(None);
        assert!(!sdk.is_embedded());
        assert!(!sdk.ready());
    }

    #[test]
    fn uncaught_exception_becomes_error_event() {
        let (sdk, parent) = embedded();
        sdk.capture_exception(UncaughtError {
            message: "x is not defined".to_string(),
            source: Some("about:srcdoc".to_string()),
            lineno: Some(10),
            colno: Some(5),
            error: Some(json!({ "name": "ReferenceError", "message": "x is not defined" })),
        });

        let sent = parent.0.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0]["event"],
            json!({
                "type": "error",
                "data": {
                    "message": "x is not defined",
                    "source": "about:srcdoc",
                    "lineno": 10,
                    "colno": 5,
                    "error": { "name": "ReferenceError", "message": "x is not defined" }
                }
            })
        );
    }

    #[test]
    fn empty_exception_message_falls_back() {
        let (sdk, parent) = embedded();
        sdk.capture_exception(UncaughtError::default());
        assert_eq!(parent.0.borrow()[0]["event"]["data"]["message"], "Unknown error");
    }

    #[test]
    fn string_rejection_uses_reason_as_message() {
        let (sdk, parent) = embedded();
        sdk.capture_rejection(RejectionReason::Other("boom".to_string()));

        let sent = parent.0.borrow();
        assert_eq!(sent.len(), 1);
        let data = &sent[0]["event"]["data"];
        assert_eq!(data["message"], "boom");
        assert_eq!(data["error"]["message"], "boom");
        assert!(data.get("lineno").is_none());
    }

    #[test]
    fn error_rejection_keeps_error_object() {
        let (sdk, parent) = embedded();
        let error = json!({ "name": "TypeError", "message": "nope", "stack": "at game.js:1" });
        sdk.capture_rejection(RejectionReason::Error {
            message: "nope".to_string(),
            error: error.clone(),
        });
        assert_eq!(parent.0.borrow()[0]["event"]["data"]["error"], error);
    }

    #[test]
    fn report_error_forwards_odd_payloads() {
        let (sdk, parent) = embedded();
        sdk.report_error(json!({ "message": "sprite missing", "key": "bg" }));
        sdk.report_error(json!(404));

        let sent = parent.0.borrow();
        assert_eq!(
            sent[0]["event"]["data"],
            json!({ "message": "sprite missing", "key": "bg" })
        );
        assert_eq!(sent[1]["event"]["data"]["message"], "404");
    }

    #[test]
    fn report_error_keeps_fields_with_unexpected_types() {
        let (sdk, parent) = embedded();
        sdk.report_error(json!({ "message": "level failed", "lineno": -1, "code": 7 }));

        let sent = parent.0.borrow();
        let data = &sent[0]["event"]["data"];
        assert_eq!(
            *data,
            json!({ "message": "level failed", "lineno": -1, "code": 7 })
        );
        // the host side still accepts what was sent
        let decoded = protocol::decode(&sent[0]).unwrap();
        assert_eq!(decoded.data().as_ref(), Some(data));
    }

    #[test]
    fn inbound_events_reach_every_listener() {
        let (sdk, _) = embedded();
        let hits = Rc::new(Cell::new(0));
        for _ in 0..2 {
            let seen = hits.clone();
            sdk.on(EventType::Ready, move |_| seen.set(seen.get() + 1));
        }

        let invoked = sdk.handle_message(&protocol::encode(&GameEvent::Ready));
        assert_eq!(invoked, 2);
        assert_eq!(hits.get(), 2);

        assert_eq!(sdk.handle_message(&json!({ "type": "unrelated" })), 0);
        assert_eq!(sdk.handle_message(&protocol::encode(&GameEvent::Wager)), 0);
    }
}
