use js_sys::Reflect;
use wasm_bindgen::JsValue;

/// Failures inside the web bridge. Converted to a JS `Error` at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("no global window")]
    NoWindow,

    #[error("window has no document")]
    NoDocument,

    #[error("invalid preview config: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Protocol(#[from] playframe::ProtocolError),

    #[error("JavaScript error: {0}")]
    Js(String),
}

impl From<JsValue> for WebError {
    fn from(value: JsValue) -> Self {
        WebError::Js(describe(&value))
    }
}

impl From<serde_wasm_bindgen::Error> for WebError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        WebError::Js(err.to_string())
    }
}

impl From<WebError> for JsValue {
    fn from(err: WebError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

/// Best-effort human-readable text for a thrown JS value.
/// Reads `message` by property so errors from another realm work too.
pub fn describe(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if value.is_object() {
        if let Some(message) = Reflect::get(value, &JsValue::from_str("message"))
            .ok()
            .and_then(|m| m.as_string())
        {
            return message;
        }
    }
    format!("{value:?}")
}
