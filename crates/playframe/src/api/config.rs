use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a preview host, provided by the embedding page.
/// Loaded from JSON; every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    /// iframe `sandbox` attribute (default: "allow-scripts allow-same-origin").
    pub sandbox: String,
    /// Guest global holding the SDK instance (default: "GameGPTSDK").
    pub sdk_global: String,
    /// Guest global asset table (default: "ASSETS").
    pub assets_global: String,
    /// Guest global readiness flag (default: "ASSETS_LOADED").
    pub assets_loaded_global: String,
    /// Guest global array of asset keys the game expects (default: "ASSET_KEYS").
    pub asset_keys_global: String,
    /// Event dispatched on the guest window once assets are installed (default: "assets-ready").
    pub assets_ready_event: String,
    /// Per-asset decode timeout in milliseconds. 0 disables it (default: 10000).
    pub asset_timeout_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            sandbox: "allow-scripts allow-same-origin".to_string(),
            sdk_global: "GameGPTSDK".to_string(),
            assets_global: "ASSETS".to_string(),
            assets_loaded_global: "ASSETS_LOADED".to_string(),
            asset_keys_global: "ASSET_KEYS".to_string(),
            assets_ready_event: "assets-ready".to_string(),
            asset_timeout_ms: 10_000,
        }
    }
}

impl PreviewConfig {
    /// Parse a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn asset_timeout(&self) -> Option<Duration> {
        (self.asset_timeout_ms > 0).then(|| Duration::from_millis(self.asset_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = PreviewConfig::from_json("{}").unwrap();
        assert_eq!(config, PreviewConfig::default());
        assert_eq!(config.asset_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn partial_override() {
        let config = PreviewConfig::from_json(r#"{
            "sdk_global": "Sdk",
            "asset_timeout_ms": 0
        }"#)
        .unwrap();
        assert_eq!(config.sdk_global, "Sdk");
        assert_eq!(config.assets_global, "ASSETS");
        assert_eq!(config.asset_timeout(), None);
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(PreviewConfig::from_json(r#"{ "sandbx": "" }"#).is_err());
    }
}
