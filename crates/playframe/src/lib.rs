//! Host/guest protocol for previewing generated games in a sandboxed iframe.
//!
//! The guest SDK posts typed events to the parent page, the host bridge
//! dispatches them to one handler per event type, and the frame controller
//! sequences each guest generation: bind, wait for load, materialize assets
//! into the guest realm, signal readiness. Browser access lives behind
//! [`GuestWindow`] and [`MessageTarget`]; see `playframe-web`.

pub mod api;
pub mod assets;
pub mod bridge;
pub mod core;
pub mod error;

// Re-export key types at crate root for convenience
pub use api::checklist::{Checklist, ChecklistItem};
pub use api::config::PreviewConfig;
pub use api::events::{ErrorData, EventType, GameEvent, GameOverData};
pub use assets::manifest::{AssetBytes, AssetKind, AssetMap, AssetSource};
pub use assets::pipeline::{materialize, MaterializeReport};
pub use assets::registry::AssetTable;
pub use bridge::client::{GuestSdk, RejectionReason, UncaughtError};
pub use bridge::host::HostBridge;
pub use bridge::protocol::{MessageTarget, ENVELOPE_TYPE};
pub use crate::core::lifecycle::{FrameController, FramePhase, Generation, LoadOutcome};
pub use crate::core::window::GuestWindow;
pub use error::{AssetError, GuestError, ProtocolError};
