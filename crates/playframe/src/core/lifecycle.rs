use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::api::config::PreviewConfig;
use crate::api::events::{EventType, GameEvent};
use crate::assets::manifest::AssetMap;
use crate::assets::pipeline::{materialize, MaterializeReport};
use crate::bridge::host::HostBridge;
use crate::core::window::GuestWindow;

type EventSink = Rc<dyn Fn(&GameEvent)>;

/// One iframe lifetime, from creation to the next reload.
/// Compared at every async continuation before guest state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Where the current generation is in its bind → load → materialize sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// No guest window yet.
    Unbound,
    /// Bridge bound to the window, SDK installing.
    Bound,
    /// Waiting for the guest document's load event.
    Loading,
    /// Asset batch in flight.
    Materializing,
    /// Table installed, readiness flag set, event dispatched.
    Ready,
}

impl FramePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            FramePhase::Unbound => "unbound",
            FramePhase::Bound => "bound",
            FramePhase::Loading => "loading",
            FramePhase::Materializing => "materializing",
            FramePhase::Ready => "ready",
        }
    }
}

/// Result of handling a guest load event.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Assets installed. `reconciled` is the asset map adjusted to the keys the
    /// game declares, when they differ from the current ones.
    Ready {
        generation: Generation,
        report: MaterializeReport,
        reconciled: Option<AssetMap>,
    },
    /// The generation was superseded before or during materialization.
    Stale,
    /// The guest document is not fully loaded yet.
    NotComplete,
    /// This generation already materialized.
    AlreadyLoaded,
}

/// Owns the guest generation counter and sequences bridge binding, SDK
/// installation and asset materialization for each new guest document.
///
/// At most one bridge connection and one materialization are current. A
/// completion belonging to an older generation is discarded, never applied.
pub struct FrameController<W: GuestWindow> {
    bridge: Rc<HostBridge<W>>,
    asset_timeout: Option<Duration>,
    generation: Cell<u64>,
    phase: Cell<FramePhase>,
    sdk_installed: Cell<bool>,
    window: RefCell<Option<W>>,
    sink: RefCell<Option<EventSink>>,
}

impl<W: GuestWindow> FrameController<W> {
    pub fn new(bridge: Rc<HostBridge<W>>, config: &PreviewConfig) -> Self {
        Self {
            bridge,
            asset_timeout: config.asset_timeout(),
            generation: Cell::new(0),
            phase: Cell::new(FramePhase::Unbound),
            sdk_installed: Cell::new(false),
            window: RefCell::new(None),
            sink: RefCell::new(None),
        }
    }

    pub fn bridge(&self) -> &Rc<HostBridge<W>> {
        &self.bridge
    }

    pub fn generation(&self) -> Generation {
        Generation(self.generation.get())
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation.get() == generation.0
    }

    pub fn phase(&self) -> FramePhase {
        self.phase.get()
    }

    pub fn sdk_installed(&self) -> bool {
        self.sdk_installed.get()
    }

    /// Where guest events go. Takes effect on the next [`mount`](Self::mount).
    pub fn set_event_sink<F>(&self, sink: F)
    where
        F: Fn(&GameEvent) + 'static,
    {
        *self.sink.borrow_mut() = Some(Rc::new(sink));
    }

    /// Start a new generation. Everything bound to the previous one is
    /// dropped: handlers, window binding, SDK flag, phase.
    pub fn reload(&self) -> Generation {
        self.generation.set(self.generation.get() + 1);
        self.teardown();
        let generation = self.generation();
        log::info!("preview: reloading, now {generation}");
        generation
    }

    /// Forget the current guest without starting a new generation's document.
    pub fn unmount(&self) {
        self.generation.set(self.generation.get() + 1);
        self.teardown();
    }

    fn teardown(&self) {
        self.bridge.reset_host();
        self.bridge.disconnect();
        self.window.borrow_mut().take();
        self.sdk_installed.set(false);
        self.phase.set(FramePhase::Unbound);
    }

    /// Bind a freshly created guest window to `generation`.
    /// Returns false if the generation is no longer current.
    pub fn mount(&self, generation: Generation, window: W) -> bool {
        if !self.is_current(generation) {
            log::debug!("preview: ignoring mount for superseded {generation}");
            return false;
        }
        self.bridge.reset_host();
        self.bridge.connect_to(window.clone());
        self.register_handlers();
        self.phase.set(FramePhase::Bound);

        if let Err(err) = window.reset_asset_globals() {
            log::warn!("preview: {err}");
        }
        self.ensure_sdk(&window);
        *self.window.borrow_mut() = Some(window);
        self.phase.set(FramePhase::Loading);
        true
    }

    fn register_handlers(&self) {
        let Some(sink) = self.sink.borrow().clone() else {
            return;
        };
        for event_type in EventType::ALL {
            let sink = sink.clone();
            self.bridge.on_event(event_type, move |event| sink(event));
        }
    }

    fn ensure_sdk(&self, window: &W) {
        if self.sdk_installed.get() && window.has_sdk() {
            return;
        }
        match window.install_sdk() {
            Ok(()) => self.sdk_installed.set(true),
            Err(err) => {
                self.sdk_installed.set(false);
                log::warn!("preview: {err}");
            }
        }
    }

    /// Handle the guest document's load event for `generation`: materialize
    /// `assets` into the guest, install them, signal readiness and report
    /// how the asset keys should be reconciled.
    pub async fn on_load(&self, generation: Generation, assets: &AssetMap) -> LoadOutcome {
        if !self.is_current(generation) {
            log::debug!("preview: load event for superseded {generation}");
            return LoadOutcome::Stale;
        }
        let Some(window) = self.window.borrow().clone() else {
            log::debug!("preview: load event before mount for {generation}");
            return LoadOutcome::Stale;
        };
        if matches!(self.phase(), FramePhase::Materializing | FramePhase::Ready) {
            return LoadOutcome::AlreadyLoaded;
        }
        if !window.is_document_complete() {
            return LoadOutcome::NotComplete;
        }

        // Navigation to the generated document replaces the globals set at mount.
        self.ensure_sdk(&window);

        self.phase.set(FramePhase::Materializing);
        let (table, report) = materialize(&window, assets, self.asset_timeout).await;

        if !self.is_current(generation) {
            log::debug!("preview: discarding asset batch for superseded {generation}");
            return LoadOutcome::Stale;
        }

        if let Err(err) = window.install_assets(table) {
            log::warn!("preview: {err}");
        }
        if let Err(err) = window.mark_assets_ready() {
            log::warn!("preview: {err}");
        }
        self.phase.set(FramePhase::Ready);
        log::info!(
            "preview: {generation} ready ({} loaded, {} skipped, {} failed)",
            report.loaded,
            report.skipped,
            report.failed
        );

        let reconciled = window
            .declared_asset_keys()
            .and_then(|declared| assets.reconcile(&declared));
        if let Some(next) = &reconciled {
            log::info!("preview: game declares {} asset keys, reconciling", next.len());
        }
        LoadOutcome::Ready {
            generation,
            report,
            reconciled,
        }
    }
}
