use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::api::events::{EventType, GameEvent};
use crate::bridge::protocol::{self, MessageTarget};

type Handler = Rc<dyn Fn(&GameEvent)>;

/// Parent-page end of the protocol.
///
/// Holds at most one guest window and at most one handler per event type.
/// The page-level message listener belongs to whoever owns the bridge and is
/// attached once; only the target window changes across reloads. All methods
/// take `&self` so handlers may call back into the bridge while being
/// dispatched.
pub struct HostBridge<W> {
    target: RefCell<Option<W>>,
    handlers: RefCell<HashMap<EventType, Handler>>,
}

impl<W: MessageTarget> HostBridge<W> {
    pub fn new() -> Self {
        Self {
            target: RefCell::new(None),
            handlers: RefCell::new(HashMap::new()),
        }
    }

    /// Bind to a guest window, replacing any previous binding.
    pub fn connect_to(&self, window: W) {
        *self.target.borrow_mut() = Some(window);
    }

    /// Drop the current binding. Handlers are left alone.
    pub fn disconnect(&self) {
        self.target.borrow_mut().take();
    }

    pub fn is_connected(&self) -> bool {
        self.target.borrow().is_some()
    }

    /// Register the handler for one event type. Last registration wins.
    pub fn on_event<F>(&self, event_type: EventType, handler: F)
    where
        F: Fn(&GameEvent) + 'static,
    {
        self.handlers.borrow_mut().insert(event_type, Rc::new(handler));
    }

    pub fn clear_event_handlers(&self, event_type: EventType) {
        self.handlers.borrow_mut().remove(&event_type);
    }

    /// Forget every handler so a stale page state never sees the next guest's events.
    pub fn reset_host(&self) {
        self.handlers.borrow_mut().clear();
    }

    pub fn has_handler(&self, event_type: EventType) -> bool {
        self.handlers.borrow().contains_key(&event_type)
    }

    /// Push an event down to the guest. Returns false (after a warning) when
    /// no window is bound, which is expected while a reload is in flight.
    pub fn send_event(&self, event: &GameEvent) -> bool {
        match self.target.borrow().as_ref() {
            Some(window) => {
                window.post_message(&protocol::encode(event));
                true
            }
            None => {
                log::warn!("host: game window not connected, dropping '{}'", event.event_type());
                false
            }
        }
    }

    /// Dispatch one inbound message. Returns true when a handler ran.
    ///
    /// Foreign, malformed and unknown messages are dropped; handlers run
    /// synchronously with no bridge borrow held.
    pub fn handle_message(&self, message: &Value) -> bool {
        let event = match protocol::decode(message) {
            Ok(event) => event,
            Err(err) => {
                protocol::trace_rejected("host", &err);
                return false;
            }
        };
        let handler = self.handlers.borrow().get(&event.event_type()).cloned();
        match handler {
            Some(handler) => {
                handler(&event);
                true
            }
            None => false,
        }
    }
}

impl<W: MessageTarget> Default for HostBridge<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use serde_json::json;

    #[derive(Clone, Default)]
    struct Inbox(Rc<RefCell<Vec<Value>>>);

    impl MessageTarget for Inbox {
        fn post_message(&self, message: &Value) {
            self.0.borrow_mut().push(message.clone());
        }
    }

    fn counter(bridge: &HostBridge<Inbox>, event_type: EventType) -> Rc<Cell<u32>> {
        let hits = Rc::new(Cell::new(0));
        let seen = hits.clone();
        bridge.on_event(event_type, move |_| seen.set(seen.get() + 1));
        hits
    }

    #[test]
    fn dispatches_to_matching_handler() {
        let bridge = HostBridge::<Inbox>::new();
        let scores = Rc::new(RefCell::new(Vec::new()));
        let sink = scores.clone();
        bridge.on_event(EventType::GameOver, move |event| {
            if let GameEvent::GameOver(data) = event {
                sink.borrow_mut().push(data.score);
            }
        });

        let ran = bridge.handle_message(&protocol::encode(&GameEvent::game_over(7.0)));
        assert!(ran);
        assert_eq!(*scores.borrow(), vec![7.0]);
    }

    #[test]
    fn foreign_envelopes_never_reach_handlers() {
        let bridge = HostBridge::<Inbox>::new();
        let hits = counter(&bridge, EventType::Ready);
        for message in [
            json!({ "type": "ready" }),
            json!({ "type": "other", "event": { "type": "ready" } }),
            json!([1, 2, 3]),
        ] {
            assert!(!bridge.handle_message(&message));
        }
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn unknown_event_type_is_dropped() {
        let bridge = HostBridge::<Inbox>::new();
        let hits = counter(&bridge, EventType::Ready);
        let message = json!({ "type": "game_event", "event": { "type": "teleport" } });
        assert!(!bridge.handle_message(&message));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn last_registration_wins() {
        let bridge = HostBridge::<Inbox>::new();
        let first = counter(&bridge, EventType::Wager);
        let second = counter(&bridge, EventType::Wager);
        bridge.handle_message(&protocol::encode(&GameEvent::Wager));
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn reset_host_silences_old_handlers() {
        let bridge = HostBridge::<Inbox>::new();
        let ready = counter(&bridge, EventType::Ready);
        let again = counter(&bridge, EventType::PlayAgain);
        bridge.reset_host();

        bridge.handle_message(&protocol::encode(&GameEvent::Ready));
        bridge.handle_message(&protocol::encode(&GameEvent::PlayAgain));
        assert_eq!(ready.get(), 0);
        assert_eq!(again.get(), 0);
        assert!(!bridge.has_handler(EventType::Ready));
    }

    #[test]
    fn clear_event_handlers_only_touches_one_type() {
        let bridge = HostBridge::<Inbox>::new();
        let ready = counter(&bridge, EventType::Ready);
        let wager = counter(&bridge, EventType::Wager);
        bridge.clear_event_handlers(EventType::Ready);

        bridge.handle_message(&protocol::encode(&GameEvent::Ready));
        bridge.handle_message(&protocol::encode(&GameEvent::Wager));
        assert_eq!(ready.get(), 0);
        assert_eq!(wager.get(), 1);
    }

    #[test]
    fn send_without_window_is_a_no_op() {
        let bridge = HostBridge::<Inbox>::new();
        assert!(!bridge.send_event(&GameEvent::Ready));
    }

    #[test]
    fn send_goes_to_latest_window() {
        let bridge = HostBridge::new();
        let old = Inbox::default();
        let new = Inbox::default();
        bridge.connect_to(old.clone());
        bridge.connect_to(new.clone());

        assert!(bridge.send_event(&GameEvent::HapticFeedback));
        assert!(old.0.borrow().is_empty());
        assert_eq!(
            *new.0.borrow(),
            vec![json!({ "type": "game_event", "event": { "type": "haptic_feedback" } })]
        );

        bridge.disconnect();
        assert!(!bridge.is_connected());
    }

    #[test]
    fn handler_may_reply_through_the_bridge() {
        let bridge = Rc::new(HostBridge::new());
        let inbox = Inbox::default();
        bridge.connect_to(inbox.clone());

        let echo = Rc::downgrade(&bridge);
        bridge.on_event(EventType::Ready, move |_| {
            if let Some(bridge) = echo.upgrade() {
                bridge.send_event(&GameEvent::Ready);
                bridge.clear_event_handlers(EventType::Ready);
            }
        });

        assert!(bridge.handle_message(&protocol::encode(&GameEvent::Ready)));
        assert_eq!(inbox.0.borrow().len(), 1);
        assert!(!bridge.has_handler(EventType::Ready));
    }
}
