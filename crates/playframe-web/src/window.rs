use std::rc::Rc;
use std::time::Duration;

use futures::future::{FutureExt, LocalBoxFuture};
use js_sys::{Array, Object, Reflect};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Event, Window};

use playframe::{
    AssetError, AssetKind, AssetSource, AssetTable, GuestError, GuestWindow, MessageTarget,
    PreviewConfig,
};

use crate::decode;
use crate::error::describe;
use crate::guest::GameSdk;

/// JSON → plain JS object (maps become objects, not `Map`s).
pub fn to_js(value: &Value) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or(JsValue::NULL)
}

/// JS value → JSON. `None` for values JSON cannot hold (functions, cycles, ...).
pub fn from_js(value: &JsValue) -> Option<Value> {
    serde_wasm_bindgen::from_value(value.clone()).ok()
}

fn post(window: &Window, message: &Value) {
    if let Err(err) = window.post_message(&to_js(message), "*") {
        log::warn!("postMessage failed: {}", describe(&err));
    }
}

/// The embedding parent, as seen from inside the guest.
#[derive(Clone)]
pub struct ParentTarget(pub Window);

impl MessageTarget for ParentTarget {
    fn post_message(&self, message: &Value) {
        post(&self.0, message);
    }
}

/// An iframe's content window. Every decode and global write goes through
/// this window so handles are created by the guest realm itself.
#[derive(Clone)]
pub struct WebGuestWindow {
    window: Window,
    config: Rc<PreviewConfig>,
}

impl WebGuestWindow {
    pub fn new(window: Window, config: Rc<PreviewConfig>) -> Self {
        Self { window, config }
    }

    fn set_global(&self, name: &str, value: &JsValue) -> Result<(), GuestError> {
        let failed = |reason: String| GuestError::Global {
            name: name.to_string(),
            reason,
        };
        match Reflect::set(self.window.as_ref(), &JsValue::from_str(name), value) {
            Ok(true) => Ok(()),
            Ok(false) => Err(failed("property is read-only".to_string())),
            Err(err) => Err(failed(describe(&err))),
        }
    }

    fn get_global(&self, name: &str) -> Option<JsValue> {
        Reflect::get(self.window.as_ref(), &JsValue::from_str(name))
            .ok()
            .filter(|v| !v.is_undefined() && !v.is_null())
    }
}

impl MessageTarget for WebGuestWindow {
    fn post_message(&self, message: &Value) {
        post(&self.window, message);
    }
}

impl GuestWindow for WebGuestWindow {
    type Handle = JsValue;

    fn decode_asset(
        &self,
        kind: AssetKind,
        source: &AssetSource,
    ) -> LocalBoxFuture<'static, Result<JsValue, AssetError>> {
        let window = self.window.clone();
        let source = source.clone();
        async move { decode::load(&window, kind, &source).await }.boxed_local()
    }

    fn delay(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        gloo_timers::future::sleep(duration).boxed_local()
    }

    fn is_document_complete(&self) -> bool {
        self.window
            .document()
            .is_some_and(|doc| doc.ready_state() == "complete")
    }

    fn has_sdk(&self) -> bool {
        self.get_global(&self.config.sdk_global).is_some()
    }

    fn install_sdk(&self) -> Result<(), GuestError> {
        let sdk = GameSdk::attach(&self.window)
            .map_err(|err| GuestError::SdkInstall(err.to_string()))?;
        self.set_global(&self.config.sdk_global, &JsValue::from(sdk))
    }

    fn reset_asset_globals(&self) -> Result<(), GuestError> {
        self.set_global(&self.config.assets_global, &Object::new())?;
        self.set_global(&self.config.assets_loaded_global, &JsValue::FALSE)
    }

    fn install_assets(&self, table: AssetTable<JsValue>) -> Result<(), GuestError> {
        let assets = Object::new();
        for (key, handle) in table.iter() {
            Reflect::set(&assets, &JsValue::from_str(key), handle).map_err(|err| {
                GuestError::Global {
                    name: format!("{}.{key}", self.config.assets_global),
                    reason: describe(&err),
                }
            })?;
        }
        // single assignment: the game sees the old table or the complete new one
        self.set_global(&self.config.assets_global, &assets)
    }

    fn mark_assets_ready(&self) -> Result<(), GuestError> {
        self.set_global(&self.config.assets_loaded_global, &JsValue::TRUE)?;
        let name = &self.config.assets_ready_event;
        let dispatch = Event::new(name).and_then(|event| self.window.dispatch_event(&event));
        dispatch.map(|_| ()).map_err(|err| GuestError::Global {
            name: name.clone(),
            reason: describe(&err),
        })
    }

    fn declared_asset_keys(&self) -> Option<Vec<String>> {
        let value = self.get_global(&self.config.asset_keys_global)?;
        if !Array::is_array(&value) {
            return None;
        }
        let keys: Array = value.unchecked_into();
        Some(keys.iter().filter_map(|key| key.as_string()).collect())
    }
}
