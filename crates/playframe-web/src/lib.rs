//! Browser bindings for `playframe`.
//!
//! [`PreviewHost`] is what the embedding page constructs: it owns the
//! preview iframe, the asset map and the integration checklist.
//! [`GameSdk`] is what the generated game sees on its global object.

pub mod decode;
pub mod error;
pub mod guest;
pub mod host;
pub mod window;

use wasm_bindgen::prelude::*;

pub use error::WebError;
pub use guest::GameSdk;
pub use host::PreviewHost;
pub use window::{ParentTarget, WebGuestWindow};

/// Install the panic hook and the console logger. Idempotent; the
/// constructors call it themselves.
#[wasm_bindgen(js_name = previewInit)]
pub fn preview_init() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}
