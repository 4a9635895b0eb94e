use std::time::Duration;

use futures::future::{self, Either, FutureExt, LocalBoxFuture};

use crate::assets::manifest::{AssetMap, AssetSource};
use crate::assets::registry::AssetTable;
use crate::core::window::GuestWindow;
use crate::error::AssetError;

/// Outcome counts for one materialization batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Keys decoded into a handle.
    pub loaded: usize,
    /// Keys with no source.
    pub skipped: usize,
    /// Keys whose decode failed or timed out.
    pub failed: usize,
}

/// Decode every asset in `assets` inside `window`'s realm.
///
/// All decodes run concurrently and the whole batch is awaited before the
/// table is returned, so nothing is ever installed incrementally. A bad key
/// resolves to "absent" and never blocks the others.
///
/// This only builds the table. Installing it is the caller's job, after
/// checking that `window` is still the current guest.
pub async fn materialize<W: GuestWindow>(
    window: &W,
    assets: &AssetMap,
    timeout: Option<Duration>,
) -> (AssetTable<W::Handle>, MaterializeReport) {
    let pending = assets.iter().map(|(key, source)| {
        let key = key.to_string();
        let decode = decode_one(window, source, timeout);
        async move { (key, decode.await) }
    });
    let results = future::join_all(pending).await;

    let mut table = AssetTable::new();
    let mut report = MaterializeReport::default();
    for (key, result) in results {
        match result {
            Ok(handle) => {
                table.insert(key, handle);
                report.loaded += 1;
            }
            Err(AssetError::Missing) => {
                log::debug!("asset '{key}': no source, skipping");
                report.skipped += 1;
            }
            Err(err) => {
                log::warn!("asset '{key}': {err}");
                report.failed += 1;
            }
        }
    }
    (table, report)
}

fn decode_one<W: GuestWindow>(
    window: &W,
    source: &AssetSource,
    timeout: Option<Duration>,
) -> LocalBoxFuture<'static, Result<W::Handle, AssetError>> {
    if source.is_empty() {
        return future::ready(Err(AssetError::Missing)).boxed_local();
    }
    let decode = window.decode_asset(source.kind(), source);
    let Some(after) = timeout else {
        return decode;
    };
    let delay = window.delay(after);
    async move {
        match future::select(decode, delay).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => Err(AssetError::TimedOut { after }),
        }
    }
    .boxed_local()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::manifest::AssetBytes;
    use crate::core::window::fake::FakeWindow;
    use futures::executor::block_on;

    fn url(s: &str) -> AssetSource {
        AssetSource::Url(s.to_string())
    }

    #[test]
    fn all_valid_sources_load() {
        let window = FakeWindow::new();
        let assets: AssetMap = [
            ("bg", url("bg.png")),
            ("jump", url("jump.mp3")),
            ("upload", AssetSource::Bytes(AssetBytes::new(vec![1, 2], None))),
        ]
        .into_iter()
        .collect();

        let (table, report) = block_on(materialize(&window, &assets, None));
        assert_eq!(report, MaterializeReport { loaded: 3, skipped: 0, failed: 0 });
        assert_eq!(table.get("bg").map(String::as_str), Some("Image:bg.png"));
        assert_eq!(table.get("jump").map(String::as_str), Some("Audio:jump.mp3"));
        assert_eq!(table.get("upload").map(String::as_str), Some("bytes:2"));
    }

    #[test]
    fn invalid_sources_are_absent_not_fatal() {
        // N = 5 keys, K = 3 invalid (empty, placeholder, broken).
        let window = FakeWindow::new();
        let assets: AssetMap = [
            ("bg", url("bg.png")),
            ("blank", url("")),
            ("missing", AssetSource::Empty),
            ("broken", url("bad:hero.png")),
            ("coin", url("coin.png")),
        ]
        .into_iter()
        .collect();

        let (table, report) = block_on(materialize(&window, &assets, None));
        assert_eq!(table.len(), 2);
        assert!(table.get("broken").is_none());
        assert_eq!(report, MaterializeReport { loaded: 2, skipped: 2, failed: 1 });
        // decode is never attempted for empty sources
        assert_eq!(window.state().decodes, 3);
    }

    #[test]
    fn all_invalid_gives_empty_table() {
        let window = FakeWindow::new();
        let assets: AssetMap = [("x", url("bad:x.png")), ("y", AssetSource::Empty)]
            .into_iter()
            .collect();
        let (table, report) = block_on(materialize(&window, &assets, None));
        assert!(table.is_empty());
        assert_eq!(report.loaded, 0);
    }

    #[test]
    fn empty_map_resolves_immediately() {
        let window = FakeWindow::new();
        let (table, report) = block_on(materialize(&window, &AssetMap::new(), None));
        assert!(table.is_empty());
        assert_eq!(report, MaterializeReport::default());
    }

    #[test]
    fn hung_source_times_out_without_blocking_others() {
        let window = FakeWindow::new();
        window.state_mut().timeouts_fire = true;
        let assets: AssetMap = [("slow", url("hang:music.ogg")), ("bg", url("bg.png"))]
            .into_iter()
            .collect();

        let (table, report) = block_on(materialize(&window, &assets, Some(Duration::from_millis(50))));
        assert_eq!(report, MaterializeReport { loaded: 1, skipped: 0, failed: 1 });
        assert!(table.get("bg").is_some());
        assert!(table.get("slow").is_none());
    }
}
