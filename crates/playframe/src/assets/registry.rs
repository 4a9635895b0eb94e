use std::collections::HashMap;

/// Decoded assets ready to be installed on a guest, keyed by logical name.
/// Only successfully decoded keys are present.
pub struct AssetTable<H> {
    handles: HashMap<String, H>,
}

impl<H> AssetTable<H> {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, handle: H) {
        self.handles.insert(key.into(), handle);
    }

    /// Look up a handle by key. Returns None if the key failed or was never decoded.
    pub fn get(&self, key: &str) -> Option<&H> {
        self.handles.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &H)> {
        self.handles.iter().map(|(k, h)| (k.as_str(), h))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<H> Default for AssetTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut table = AssetTable::new();
        table.insert("hero", 7u32);
        assert_eq!(table.get("hero"), Some(&7));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unknown_returns_none() {
        let table = AssetTable::<u32>::new();
        assert!(table.get("nonexistent").is_none());
        assert!(table.is_empty());
    }
}
