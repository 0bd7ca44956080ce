//! Listener and session settings.

use serde::{Deserialize, Serialize};
use subhub_core::RequestKind;

/// Server network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`0` picks a free port).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Outbound frames buffered per connection before frames are dropped.
    pub max_send_queue: usize,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
    /// Interval between `Heartbeat` frames in milliseconds.
    pub pulse_interval_ms: u64,
    /// Processing delay applied before a subscribe, in milliseconds.
    pub subscribe_delay_ms: u64,
    /// Processing delay applied before an unsubscribe, in milliseconds.
    pub unsubscribe_delay_ms: u64,
    /// Caller identity used when a connection does not name one.
    pub default_caller: String,
    /// Request header that names the caller identity, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_header: Option<String>,
    /// Request kinds this server handles.
    pub actions: Vec<RequestKind>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_connections: 1024,
            max_send_queue: 256,
            max_message_size: 64 * 1024,
            pulse_interval_ms: 1000,
            subscribe_delay_ms: 4000,
            unsubscribe_delay_ms: 8000,
            default_caller: "user1".to_string(),
            identity_header: None,
            actions: RequestKind::ALL.to_vec(),
        }
    }
}
