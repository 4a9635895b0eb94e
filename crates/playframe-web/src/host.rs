use std::cell::RefCell;
use std::rc::{Rc, Weak};

use js_sys::{Array, ArrayBuffer, Function, Promise, Uint8Array};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, spawn_local, JsFuture};
use web_sys::{Document, File, HtmlElement, HtmlIFrameElement, MessageEvent, Window};

use playframe::{
    AssetBytes, AssetMap, AssetSource, Checklist, EventType, FrameController, GameEvent,
    Generation, HostBridge, LoadOutcome, PreviewConfig,
};

use crate::error::{describe, WebError};
use crate::window::{from_js, to_js, WebGuestWindow};

/// The iframe of one generation and its load listener.
struct MountedFrame {
    iframe: HtmlIFrameElement,
    on_load: Closure<dyn FnMut()>,
}

/// Apply one asset edit, then re-stamp URL versions.
fn edit_assets<R>(assets: &mut AssetMap, version: u64, update: impl FnOnce(&mut AssetMap) -> R) -> R {
    let result = update(assets);
    assets.stamp_version(version);
    result
}

impl Drop for MountedFrame {
    fn drop(&mut self) {
        let _ = self
            .iframe
            .remove_event_listener_with_callback("load", self.on_load.as_ref().unchecked_ref());
        self.iframe.remove();
    }
}

struct HostInner {
    document: Document,
    container: HtmlElement,
    config: Rc<PreviewConfig>,
    controller: FrameController<WebGuestWindow>,
    frame: RefCell<Option<MountedFrame>>,
    html: RefCell<String>,
    assets: RefCell<AssetMap>,
    checklist: RefCell<Checklist>,
    event_callback: RefCell<Option<Function>>,
    reconcile_callback: RefCell<Option<Function>>,
}

impl HostInner {
    fn render(self: &Rc<Self>, html: String) -> Result<(), WebError> {
        let generation = self.controller.reload();
        self.frame.borrow_mut().take();
        *self.html.borrow_mut() = html;

        let iframe: HtmlIFrameElement = self
            .document
            .create_element("iframe")?
            .dyn_into()
            .map_err(|_| WebError::Js("created element is not an iframe".to_string()))?;
        iframe.set_attribute("sandbox", &self.config.sandbox)?;
        iframe.set_title("Game Preview");
        iframe.set_srcdoc(&self.html.borrow());

        let weak: Weak<HostInner> = Rc::downgrade(self);
        let on_load = Closure::<dyn FnMut()>::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.handle_load(generation);
            }
        });
        iframe.add_event_listener_with_callback("load", on_load.as_ref().unchecked_ref())?;
        self.container.append_child(&iframe)?;

        match iframe.content_window() {
            Some(window) => {
                self.controller
                    .mount(generation, WebGuestWindow::new(window, self.config.clone()));
            }
            None => log::warn!("preview host: iframe has no content window after insertion"),
        }
        *self.frame.borrow_mut() = Some(MountedFrame { iframe, on_load });
        Ok(())
    }

    fn handle_load(self: Rc<Self>, generation: Generation) {
        spawn_local(async move {
            let assets = self.assets.borrow().clone();
            match self.controller.on_load(generation, &assets).await {
                LoadOutcome::Ready {
                    reconciled: Some(next),
                    ..
                } => {
                    let declared: Vec<String> = next.keys().map(String::from).collect();
                    self.reconcile(&declared);
                }
                LoadOutcome::NotComplete => {
                    log::debug!("preview host: {generation} fired load before its document completed");
                }
                LoadOutcome::Ready { .. } | LoadOutcome::Stale | LoadOutcome::AlreadyLoaded => {}
            }
        });
    }

    /// Adopt the game's declared key list. Compared against the current map,
    /// not the snapshot the load used, so edits made meanwhile survive.
    fn reconcile(&self, declared: &[String]) {
        let next = self.assets.borrow().reconcile(declared);
        let Some(next) = next else {
            return;
        };
        *self.assets.borrow_mut() = next;
        self.stamp_assets();
        self.notify_reconciled();
    }

    fn update_assets<R>(&self, update: impl FnOnce(&mut AssetMap) -> R) -> R {
        let version = js_sys::Date::now() as u64;
        edit_assets(&mut self.assets.borrow_mut(), version, update)
    }

    fn stamp_assets(&self) {
        self.assets.borrow_mut().stamp_version(js_sys::Date::now() as u64);
    }

    fn asset_keys(&self) -> Array {
        self.assets
            .borrow()
            .keys()
            .map(JsValue::from_str)
            .collect()
    }

    fn notify_reconciled(&self) {
        let callback = self.reconcile_callback.borrow().clone();
        if let Some(callback) = callback {
            if let Err(err) = callback.call1(&JsValue::NULL, &self.asset_keys()) {
                log::warn!("preview host: reconcile callback threw: {}", describe(&err));
            }
        }
    }

    fn on_guest_event(&self, event: &GameEvent) {
        if let GameEvent::Error(error) = event {
            log::debug!("preview host: game reported error: {}", error.message);
        }
        self.checklist.borrow_mut().apply(event);

        let callback = self.event_callback.borrow().clone();
        if let Some(callback) = callback {
            let kind = JsValue::from_str(event.event_type().as_str());
            let data = event.data().map(|d| to_js(&d)).unwrap_or(JsValue::UNDEFINED);
            if let Err(err) = callback.call2(&JsValue::NULL, &kind, &data) {
                log::warn!("preview host: event callback threw: {}", describe(&err));
            }
        }
    }
}

/// Renders generated game HTML into a sandboxed iframe inside a container
/// element and relays SDK events between the page and the game.
#[wasm_bindgen]
pub struct PreviewHost {
    inner: Rc<HostInner>,
    host_window: Window,
    on_message: Closure<dyn FnMut(MessageEvent)>,
}

#[wasm_bindgen]
impl PreviewHost {
    /// `config` is an optional JSON string of preview settings.
    #[wasm_bindgen(constructor)]
    pub fn new(container: HtmlElement, config: Option<String>) -> Result<PreviewHost, JsValue> {
        crate::preview_init();
        let host_window = web_sys::window().ok_or(WebError::NoWindow)?;
        let document = host_window.document().ok_or(WebError::NoDocument)?;
        let config = match config {
            Some(json) => PreviewConfig::from_json(&json).map_err(WebError::from)?,
            None => PreviewConfig::default(),
        };

        let bridge = Rc::new(HostBridge::new());
        let inner = Rc::new(HostInner {
            document,
            container,
            controller: FrameController::new(bridge.clone(), &config),
            config: Rc::new(config),
            frame: RefCell::new(None),
            html: RefCell::new(String::new()),
            assets: RefCell::new(AssetMap::new()),
            checklist: RefCell::new(Checklist::new()),
            event_callback: RefCell::new(None),
            reconcile_callback: RefCell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        inner.controller.set_event_sink(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_guest_event(event);
            }
        });

        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if let Some(message) = from_js(&event.data()) {
                bridge.handle_message(&message);
            }
        });
        host_window.add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())?;

        log::info!("preview host: initialized");
        Ok(PreviewHost {
            inner,
            host_window,
            on_message,
        })
    }

    /// Replace the preview with a fresh document built from `html`.
    pub fn render(&self, html: String) -> Result<(), JsValue> {
        Ok(self.inner.render(html)?)
    }

    /// Re-render the last HTML, e.g. after asset edits.
    pub fn reload(&self) -> Result<(), JsValue> {
        let html = self.inner.html.borrow().clone();
        Ok(self.inner.render(html)?)
    }

    /// Tear down the current iframe without creating a new one.
    pub fn unmount(&self) {
        self.inner.controller.unmount();
        self.inner.frame.borrow_mut().take();
    }

    #[wasm_bindgen(js_name = setAssetUrl)]
    pub fn set_asset_url(&self, key: String, url: String) {
        self.inner
            .update_assets(|assets| assets.insert(key, AssetSource::Url(url)));
    }

    /// Read an uploaded file and store its bytes under `key`.
    /// Resolves once the bytes are stored.
    #[wasm_bindgen(js_name = setAssetFile)]
    pub fn set_asset_file(&self, key: String, file: File) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            let buffer: ArrayBuffer = JsFuture::from(file.array_buffer()).await?.dyn_into()?;
            let data = Uint8Array::new(&buffer).to_vec();
            let bytes = AssetBytes::new(data, Some(file.type_()));
            log::debug!("preview host: stored {} bytes for asset '{key}'", bytes.data().len());
            inner.update_assets(|assets| assets.insert(key, AssetSource::Bytes(bytes)));
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Keep `key` but drop its data.
    #[wasm_bindgen(js_name = clearAsset)]
    pub fn clear_asset(&self, key: String) {
        self.inner
            .update_assets(|assets| assets.insert(key, AssetSource::Empty));
    }

    #[wasm_bindgen(js_name = removeAsset)]
    pub fn remove_asset(&self, key: &str) -> bool {
        self.inner
            .update_assets(|assets| assets.remove(key).is_some())
    }

    /// Adopt a key list, with the same rules as a game's declared keys.
    #[wasm_bindgen(js_name = setAssetKeys)]
    pub fn set_asset_keys(&self, keys: Array) {
        let keys: Vec<String> = keys.iter().filter_map(|key| key.as_string()).collect();
        self.inner.reconcile(&keys);
    }

    #[wasm_bindgen(js_name = assetKeys)]
    pub fn asset_keys(&self) -> Array {
        self.inner.asset_keys()
    }

    /// `callback(type, data)` for every event the game sends.
    #[wasm_bindgen(js_name = onEvent)]
    pub fn on_event(&self, callback: Option<Function>) {
        *self.inner.event_callback.borrow_mut() = callback;
    }

    /// `callback(keys)` whenever the asset key list changes to match the game.
    #[wasm_bindgen(js_name = onAssetsReconciled)]
    pub fn on_assets_reconciled(&self, callback: Option<Function>) {
        *self.inner.reconcile_callback.borrow_mut() = callback;
    }

    /// Push an event down to the running game. False when no game is mounted.
    #[wasm_bindgen(js_name = sendEvent)]
    pub fn send_event(&self, event_type: &str, data: JsValue) -> Result<bool, JsValue> {
        let event_type: EventType = event_type.parse().map_err(WebError::from)?;
        let data = if data.is_undefined() { None } else { from_js(&data) };
        let event = GameEvent::from_parts(event_type, data).map_err(WebError::from)?;
        Ok(self.inner.controller.bridge().send_event(&event))
    }

    /// Current checklist as `{ ready, score, play_again, wager }`.
    pub fn checklist(&self) -> Result<JsValue, JsValue> {
        let checklist = self.inner.checklist.borrow();
        let value = checklist.serialize(&serde_wasm_bindgen::Serializer::json_compatible())?;
        Ok(value)
    }

    #[wasm_bindgen(js_name = resetChecklist)]
    pub fn reset_checklist(&self) {
        *self.inner.checklist.borrow_mut() = Checklist::new();
    }

    pub fn phase(&self) -> String {
        self.inner.controller.phase().as_str().to_string()
    }

    pub fn generation(&self) -> f64 {
        self.inner.controller.generation().0 as f64
    }
}

impl Drop for PreviewHost {
    fn drop(&mut self) {
        let _ = self
            .host_window
            .remove_event_listener_with_callback("message", self.on_message.as_ref().unchecked_ref());
        self.inner.controller.unmount();
        self.inner.frame.borrow_mut().take();
    }
}
