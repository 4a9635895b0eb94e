use std::time::Duration;

use crate::api::events::EventType;

/// Reasons an inbound message is not turned into a [`GameEvent`](crate::GameEvent).
///
/// Every variant is dropped silently by the receiving side: the channel is
/// shared with unrelated platform messages, and newer guests may speak event
/// types an older host does not know.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message is not a game_event envelope")]
    Foreign,

    #[error("game_event envelope has no valid inner event")]
    MalformedEnvelope,

    #[error("unknown event type '{0}'")]
    UnknownEventType(String),

    #[error("malformed payload for '{event_type}': {source}")]
    MalformedPayload {
        event_type: EventType,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-key asset decode failure. Never aborts a materialization batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssetError {
    #[error("no source")]
    Missing,

    #[error("decode failed: {reason}")]
    DecodeFailed { reason: String },

    #[error("timed out after {after:?}")]
    TimedOut { after: Duration },
}

/// Failures touching the guest's global namespace.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GuestError {
    #[error("failed to install guest SDK: {0}")]
    SdkInstall(String),

    #[error("failed to write guest global '{name}': {reason}")]
    Global { name: String, reason: String },
}
