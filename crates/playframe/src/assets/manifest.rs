use std::rc::Rc;

/// File extensions decoded through the guest's `Audio` constructor.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "oga", "m4a", "aac", "flac", "opus"];

/// How an asset is turned into a guest-side handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Audio,
}

/// Raw bytes of an uploaded file plus its declared MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetBytes {
    data: Rc<[u8]>,
    mime: Option<String>,
}

impl AssetBytes {
    pub fn new(data: impl Into<Rc<[u8]>>, mime: Option<String>) -> Self {
        let mime = mime.filter(|m| !m.is_empty());
        Self {
            data: data.into(),
            mime,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }
}

/// Where an asset comes from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AssetSource {
    /// Placeholder for a key the game expects but nobody has supplied.
    #[default]
    Empty,
    /// Direct URL (remote file, object URL, data URL).
    Url(String),
    /// An uploaded file.
    Bytes(AssetBytes),
}

impl AssetSource {
    pub fn is_empty(&self) -> bool {
        match self {
            AssetSource::Empty => true,
            AssetSource::Url(url) => url.is_empty(),
            AssetSource::Bytes(bytes) => bytes.data().is_empty(),
        }
    }

    /// Guess the asset kind from the MIME type or URL extension.
    pub fn kind(&self) -> AssetKind {
        let audio = match self {
            AssetSource::Empty => false,
            AssetSource::Bytes(bytes) => bytes.mime().is_some_and(|m| m.starts_with("audio/")),
            AssetSource::Url(url) => url_is_audio(url),
        };
        if audio {
            AssetKind::Audio
        } else {
            AssetKind::Image
        }
    }
}

fn url_is_audio(url: &str) -> bool {
    if let Some(rest) = url.strip_prefix("data:") {
        return rest.starts_with("audio/");
    }
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rsplit_once('.') {
        Some((_, ext)) => AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Split `url` into its base, minus the `v=<digits>` parameters added by
/// [`AssetMap::stamp_version`], and its `#fragment`. Other parameters keep
/// their order.
fn strip_version(url: &str) -> (String, &str) {
    let (rest, fragment) = match url.find('#') {
        Some(idx) => url.split_at(idx),
        None => (url, ""),
    };
    let Some((path, query)) = rest.split_once('?') else {
        return (rest.to_string(), fragment);
    };
    let kept: Vec<&str> = query
        .split('&')
        .filter(|param| !param.is_empty() && !is_version_param(param))
        .collect();
    if kept.is_empty() {
        (path.to_string(), fragment)
    } else {
        (format!("{path}?{}", kept.join("&")), fragment)
    }
}

fn is_version_param(param: &str) -> bool {
    param
        .strip_prefix("v=")
        .is_some_and(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
}

/// Logical asset key → source, in insertion order.
///
/// Keys are stable across regenerations of the game; the order is what the
/// asset UI shows and what reconciliation compares against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetMap {
    entries: Vec<(String, AssetSource)>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, source: AssetSource) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = source,
            None => self.entries.push((key, source)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<AssetSource> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn get(&self, key: &str) -> Option<&AssetSource> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AssetSource)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Match the key list the game declares.
    ///
    /// Returns `None` when the declared keys already equal ours (same order).
    /// Otherwise the result follows the declared order, keeps our sources for
    /// surviving keys, maps new keys to [`AssetSource::Empty`] and drops keys
    /// the game no longer lists, along with their data.
    pub fn reconcile(&self, declared: &[String]) -> Option<AssetMap> {
        if self.keys().eq(declared.iter().map(String::as_str)) {
            return None;
        }
        let mut next = AssetMap::new();
        for key in declared {
            let source = self.get(key).cloned().unwrap_or_default();
            next.insert(key.clone(), source);
        }
        Some(next)
    }

    /// Append `v=<version>` to the query of every non-empty URL so regenerated
    /// games do not reuse a cached copy. Earlier stamps are replaced, not
    /// stacked.
    pub fn stamp_version(&mut self, version: u64) {
        for (_, source) in &mut self.entries {
            if let AssetSource::Url(url) = source {
                if url.is_empty() || url.starts_with("data:") || url.starts_with("blob:") {
                    continue;
                }
                let (base, fragment) = strip_version(url);
                let sep = if base.contains('?') { '&' } else { '?' };
                *url = format!("{base}{sep}v={version}{fragment}");
            }
        }
    }
}

impl<K: Into<String>> FromIterator<(K, AssetSource)> for AssetMap {
    fn from_iter<I: IntoIterator<Item = (K, AssetSource)>>(iter: I) -> Self {
        let mut map = AssetMap::new();
        for (key, source) in iter {
            map.insert(key, source);
        }
        map
    }
}
