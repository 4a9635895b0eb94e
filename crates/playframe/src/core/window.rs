//! Guest window contract.
//!
//! The core never touches a browser API. Everything it needs from the
//! sandboxed document goes through [`GuestWindow`]; `playframe-web`
//! implements it over `web_sys::Window`, tests implement it over plain
//! `Rc<RefCell<..>>` state.
//!
//! Decoded handles must be built with the guest's own constructors (its
//! `Image`/`Audio`), not the host's, so they belong to the realm that will
//! use them. Implementations are the realm handle threaded through decoding.

use std::time::Duration;

use futures::future::LocalBoxFuture;

use crate::assets::manifest::{AssetKind, AssetSource};
use crate::assets::registry::AssetTable;
use crate::bridge::protocol::MessageTarget;
use crate::error::{AssetError, GuestError};

pub trait GuestWindow: MessageTarget + Clone + 'static {
    /// Realm-local decoded asset (an `HTMLImageElement`, an `HTMLAudioElement`, ...).
    type Handle: 'static;

    /// Decode one non-empty source inside the guest realm.
    fn decode_asset(
        &self,
        kind: AssetKind,
        source: &AssetSource,
    ) -> LocalBoxFuture<'static, Result<Self::Handle, AssetError>>;

    /// Resolve after `duration`. Used for per-asset timeouts.
    fn delay(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;

    /// Whether the guest document finished loading (`readyState == "complete"`).
    fn is_document_complete(&self) -> bool;

    fn has_sdk(&self) -> bool;

    /// Put a fresh SDK instance on the guest global.
    fn install_sdk(&self) -> Result<(), GuestError>;

    /// Empty asset table and readiness flag cleared.
    fn reset_asset_globals(&self) -> Result<(), GuestError>;

    /// Replace the guest's asset table in one assignment.
    fn install_assets(&self, table: AssetTable<Self::Handle>) -> Result<(), GuestError>;

    /// Set the readiness flag and dispatch the readiness event.
    fn mark_assets_ready(&self) -> Result<(), GuestError>;

    /// Asset keys the game says it uses, if it declares any.
    fn declared_asset_keys(&self) -> Option<Vec<String>>;
}
