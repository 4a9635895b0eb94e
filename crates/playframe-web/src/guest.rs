use std::rc::Rc;

use js_sys::{Function, Object, Reflect};
use serde_json::{json, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{ErrorEvent, MessageEvent, PromiseRejectionEvent, Window};

use playframe::{EventType, GuestSdk, RejectionReason, UncaughtError};

use crate::error::{describe, WebError};
use crate::window::{from_js, to_js, ParentTarget};

/// The SDK a generated game talks to, installed on the guest global.
///
/// Installs `message`, `error` and `unhandledrejection` listeners on its
/// window and removes them when dropped.
#[wasm_bindgen]
pub struct GameSdk {
    inner: Rc<GuestSdk<ParentTarget>>,
    window: Window,
    on_message: Closure<dyn FnMut(MessageEvent)>,
    on_error: Closure<dyn FnMut(ErrorEvent)>,
    on_rejection: Closure<dyn FnMut(PromiseRejectionEvent)>,
}

impl GameSdk {
    /// Build an SDK bound to `window` and its embedding parent.
    pub fn attach(window: &Window) -> Result<GameSdk, WebError> {
        // a top-level window is its own parent
        let parent = window
            .parent()?
            .filter(|parent| !Object::is(parent.as_ref(), window.as_ref()))
            .map(ParentTarget);
        let inner = Rc::new(GuestSdk::new(parent));

        let sdk = inner.clone();
        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if let Some(message) = from_js(&event.data()) {
                sdk.handle_message(&message);
            }
        });

        let sdk = inner.clone();
        let on_error = Closure::<dyn FnMut(ErrorEvent)>::new(move |event: ErrorEvent| {
            sdk.capture_exception(UncaughtError {
                message: event.message(),
                source: Some(event.filename()),
                lineno: Some(event.lineno()),
                colno: Some(event.colno()),
                error: error_json(&event.error()),
            });
        });

        let sdk = inner.clone();
        let on_rejection =
            Closure::<dyn FnMut(PromiseRejectionEvent)>::new(move |event: PromiseRejectionEvent| {
                sdk.capture_rejection(rejection_reason(&event.reason()));
            });

        window.add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())?;
        window.add_event_listener_with_callback("error", on_error.as_ref().unchecked_ref())?;
        window.add_event_listener_with_callback(
            "unhandledrejection",
            on_rejection.as_ref().unchecked_ref(),
        )?;

        Ok(GameSdk {
            inner,
            window: window.clone(),
            on_message,
            on_error,
            on_rejection,
        })
    }
}

#[wasm_bindgen]
impl GameSdk {
    /// SDK for the current window. Games normally use the instance the
    /// preview host installs instead.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<GameSdk, JsValue> {
        crate::preview_init();
        let window = web_sys::window().ok_or(WebError::NoWindow)?;
        Ok(Self::attach(&window)?)
    }

    #[wasm_bindgen(getter, js_name = isEmbedded)]
    pub fn is_embedded(&self) -> bool {
        self.inner.is_embedded()
    }

    pub fn ready(&self) {
        self.inner.ready();
    }

    pub fn wager(&self) {
        self.inner.wager();
    }

    #[wasm_bindgen(js_name = gameOver)]
    pub fn game_over(&self, score: f64) {
        self.inner.game_over(score);
    }

    #[wasm_bindgen(js_name = playAgain)]
    pub fn play_again(&self) {
        self.inner.play_again();
    }

    #[wasm_bindgen(js_name = hapticFeedback)]
    pub fn haptic_feedback(&self) {
        self.inner.haptic_feedback();
    }

    /// Report an error payload. `Error` objects are unpacked into
    /// `{ message, error: { name, message, stack } }`.
    #[wasm_bindgen(js_name = reportError)]
    pub fn report_error(&self, data: JsValue) {
        let payload = match error_parts(&data) {
            Some((message, error)) => json!({ "message": message, "error": error }),
            None => from_js(&data).unwrap_or(Value::Null),
        };
        self.inner.report_error(payload);
    }

    /// Listen for an event pushed by the host. The callback receives the
    /// event's data, or `undefined` when it carries none.
    pub fn on(&self, event_type: &str, callback: Function) -> Result<(), JsValue> {
        let event_type: EventType = event_type.parse().map_err(WebError::from)?;
        self.inner.on(event_type, move |event| {
            let data = event.data().map(|d| to_js(&d)).unwrap_or(JsValue::UNDEFINED);
            if let Err(err) = callback.call1(&JsValue::NULL, &data) {
                log::warn!("sdk: '{event_type}' listener threw: {}", describe(&err));
            }
        });
        Ok(())
    }
}

impl Drop for GameSdk {
    fn drop(&mut self) {
        let window = &self.window;
        let _ = window
            .remove_event_listener_with_callback("message", self.on_message.as_ref().unchecked_ref());
        let _ =
            window.remove_event_listener_with_callback("error", self.on_error.as_ref().unchecked_ref());
        let _ = window.remove_event_listener_with_callback(
            "unhandledrejection",
            self.on_rejection.as_ref().unchecked_ref(),
        );
    }
}

fn property(value: &JsValue, key: &str) -> Option<String> {
    Reflect::get(value, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
}

/// `(message, {name, message, stack})` for anything shaped like an `Error`.
/// Checked by shape, since the guest's `Error` is not the host's.
fn error_parts(value: &JsValue) -> Option<(String, Value)> {
    if !value.is_object() {
        return None;
    }
    let name = property(value, "name")?;
    let message = property(value, "message")?;
    let mut error = json!({ "name": name, "message": message });
    if let Some(stack) = property(value, "stack") {
        error["stack"] = Value::String(stack);
    }
    Some((message, error))
}

fn error_json(value: &JsValue) -> Option<Value> {
    if value.is_undefined() || value.is_null() {
        return None;
    }
    error_parts(value).map(|(_, error)| error).or_else(|| from_js(value))
}

fn rejection_reason(reason: &JsValue) -> RejectionReason {
    match error_parts(reason) {
        Some((message, error)) => RejectionReason::Error { message, error },
        None => RejectionReason::Other(js_string(reason)),
    }
}

/// `String(value)`.
fn js_string(value: &JsValue) -> String {
    let string_fn = Reflect::get(&js_sys::global(), &JsValue::from_str("String"))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok());
    string_fn
        .and_then(|f| f.call1(&JsValue::UNDEFINED, value).ok())
        .and_then(|s| s.as_string())
        .unwrap_or_else(|| format!("{value:?}"))
}
