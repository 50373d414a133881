use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Protocol version stamped into chunk headers by current clients.
pub const PROTOCOL_VERSION: &str = "1";

/// Event name used for every acknowledgement.
pub const UPLOAD_EVENT: &str = "upload";

/// Time to wait for a pong response (or any incoming message).
///
/// Acts as a read deadline: a client that goes silent for this long is
/// considered gone. Large chunks on slow links must still fit inside it.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// How often the server pings idle clients.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(15);

/// Maximum message size in bytes (100 MiB).
pub const WS_MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Text-envelope event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Acknowledgement for a chunk or a status query (server to client).
    Upload,
    /// Resume query for a transfer id (client to server).
    Status,
    /// Envelope-level error, e.g. an unknown event.
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Upload => UPLOAD_EVENT,
            EventType::Status => "status",
            EventType::Error => "error",
        }
    }
}
