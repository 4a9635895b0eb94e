//! Asset decoding inside a guest realm.
//!
//! Elements are built with the guest window's own `Image`/`Audio`
//! constructors, looked up on that window, so the handles belong to the
//! document that will draw and play them.

use js_sys::{Array, Function, Promise, Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AddEventListenerOptions, Blob, BlobPropertyBag, EventTarget, Url, Window};

use playframe::{AssetBytes, AssetError, AssetKind, AssetSource};

use crate::error::describe;

pub async fn load(window: &Window, kind: AssetKind, source: &AssetSource) -> Result<JsValue, AssetError> {
    match source {
        AssetSource::Empty => Err(AssetError::Missing),
        AssetSource::Url(url) if url.is_empty() => Err(AssetError::Missing),
        AssetSource::Url(url) => load_element(window, kind, url).await,
        AssetSource::Bytes(bytes) => {
            let url = ObjectUrl::create(bytes).map_err(decode_failed)?;
            let element = load_element(window, kind, url.as_str()).await?;
            // audio keeps streaming from its URL
            if kind == AssetKind::Audio {
                url.keep();
            }
            Ok(element)
        }
    }
}

/// A blob object URL, revoked when dropped unless [`keep`](Self::keep) is
/// called. Dropping covers failures and a decode abandoned on timeout.
struct ObjectUrl {
    url: Option<String>,
    revoke: fn(&str),
}

impl ObjectUrl {
    fn create(bytes: &AssetBytes) -> Result<Self, JsValue> {
        let parts = Array::of1(&Uint8Array::from(bytes.data()));
        let options = BlobPropertyBag::new();
        if let Some(mime) = bytes.mime() {
            options.set_type(mime);
        }
        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)?;
        let url = Url::create_object_url_with_blob(&blob)?;
        Ok(Self::with_revoke(url, revoke_object_url))
    }

    fn with_revoke(url: String, revoke: fn(&str)) -> Self {
        Self {
            url: Some(url),
            revoke,
        }
    }

    fn as_str(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    fn keep(mut self) {
        self.url = None;
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        if let Some(url) = self.url.take() {
            (self.revoke)(&url);
        }
    }
}

fn revoke_object_url(url: &str) {
    let _ = Url::revoke_object_url(url);
}

async fn load_element(window: &Window, kind: AssetKind, src: &str) -> Result<JsValue, AssetError> {
    let (constructor, loaded_event) = match kind {
        AssetKind::Image => ("Image", "load"),
        AssetKind::Audio => ("Audio", "canplaythrough"),
    };
    let element = construct(window, constructor).map_err(decode_failed)?;
    let target: &EventTarget = element.unchecked_ref();

    let settled = Promise::new(&mut |resolve, reject| {
        let once = AddEventListenerOptions::new();
        once.set_once(true);
        let _ = target.add_event_listener_with_callback_and_add_event_listener_options(
            loaded_event,
            &resolve,
            &once,
        );
        let _ = target.add_event_listener_with_callback_and_add_event_listener_options(
            "error", &reject, &once,
        );
    });

    if kind == AssetKind::Audio {
        set(&element, "preload", &JsValue::from_str("auto"))?;
    }
    set(&element, "src", &JsValue::from_str(src))?;

    JsFuture::from(settled)
        .await
        .map_err(|_| AssetError::DecodeFailed {
            reason: format!("{constructor} could not load {}", abbreviate(src)),
        })?;
    Ok(element)
}

fn construct(window: &Window, name: &str) -> Result<JsValue, JsValue> {
    let constructor: Function = Reflect::get(window.as_ref(), &JsValue::from_str(name))?.dyn_into()?;
    Reflect::construct(&constructor, &Array::new())
}

fn set(target: &JsValue, key: &str, value: &JsValue) -> Result<(), AssetError> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(decode_failed)
}

fn decode_failed(err: JsValue) -> AssetError {
    AssetError::DecodeFailed {
        reason: describe(&err),
    }
}

/// Data URLs can run to megabytes; keep log lines readable.
fn abbreviate(src: &str) -> String {
    const MAX: usize = 80;
    if src.chars().count() <= MAX {
        src.to_string()
    } else {
        let head: String = src.chars().take(MAX).collect();
        format!("{head}...")
    }
}
