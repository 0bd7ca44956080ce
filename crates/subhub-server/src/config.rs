//! Runtime configuration for the listener and its sessions.

use std::time::Duration;

use subhub_core::{IdentityId, RequestKind};
use subhub_settings::ServerSettings;

/// Artificial processing delays applied before registry mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatencyProfile {
    /// Pause before a subscribe is applied.
    pub subscribe: Duration,
    /// Pause before an unsubscribe is applied.
    pub unsubscribe: Duration,
}

impl LatencyProfile {
    /// No delay at all.
    pub const fn none() -> Self {
        Self {
            subscribe: Duration::ZERO,
            unsubscribe: Duration::ZERO,
        }
    }

    /// Delay to apply before handling `kind`.
    pub fn for_kind(&self, kind: RequestKind) -> Duration {
        match kind {
            RequestKind::Subscribe => self.subscribe,
            RequestKind::Unsubscribe => self.unsubscribe,
            RequestKind::CountSubscribers => Duration::ZERO,
        }
    }
}

impl Default for LatencyProfile {
    fn default() -> Self {
        Self {
            subscribe: Duration::from_millis(4000),
            unsubscribe: Duration::from_millis(8000),
        }
    }
}

/// Configuration for the subhub server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Outbound frames buffered per connection.
    pub max_send_queue: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Interval between `Heartbeat` frames.
    pub pulse_interval: Duration,
    /// Delays before subscribe/unsubscribe.
    pub latency: LatencyProfile,
    /// Caller identity when the connection names none.
    pub default_caller: IdentityId,
    /// Header carrying the caller identity.
    pub identity_header: Option<String>,
    /// Request kinds this server handles.
    pub actions: Vec<RequestKind>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            max_send_queue: 256,
            max_message_size: 64 * 1024,
            pulse_interval: Duration::from_secs(1),
            latency: LatencyProfile::default(),
            default_caller: IdentityId::from_raw("user1"),
            identity_header: None,
            actions: RequestKind::ALL.to_vec(),
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            max_connections: s.max_connections,
            max_send_queue: s.max_send_queue.max(1),
            max_message_size: s.max_message_size,
            pulse_interval: Duration::from_millis(s.pulse_interval_ms.max(1)),
            latency: LatencyProfile {
                subscribe: Duration::from_millis(s.subscribe_delay_ms),
                unsubscribe: Duration::from_millis(s.unsubscribe_delay_ms),
            },
            default_caller: IdentityId::from_raw(s.default_caller.clone()),
            identity_header: s.identity_header.clone(),
            actions: s.actions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_any_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn default_pulse_and_latency() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.pulse_interval, Duration::from_secs(1));
        assert_eq!(cfg.latency.subscribe, Duration::from_millis(4000));
        assert_eq!(cfg.latency.unsubscribe, Duration::from_millis(8000));
    }

    #[test]
    fn latency_per_kind() {
        let latency = LatencyProfile::default();
        assert_eq!(latency.for_kind(RequestKind::Subscribe), Duration::from_secs(4));
        assert_eq!(latency.for_kind(RequestKind::Unsubscribe), Duration::from_secs(8));
        assert_eq!(latency.for_kind(RequestKind::CountSubscribers), Duration::ZERO);
        assert_eq!(LatencyProfile::none().for_kind(RequestKind::Unsubscribe), Duration::ZERO);
    }

    #[test]
    fn from_settings() {
        let settings = ServerSettings {
            port: 4000,
            pulse_interval_ms: 250,
            subscribe_delay_ms: 0,
            unsubscribe_delay_ms: 5,
            default_caller: "user2".into(),
            identity_header: Some("x-user-id".into()),
            actions: vec![RequestKind::CountSubscribers],
            ..ServerSettings::default()
        };
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.pulse_interval, Duration::from_millis(250));
        assert_eq!(cfg.latency.subscribe, Duration::ZERO);
        assert_eq!(cfg.latency.unsubscribe, Duration::from_millis(5));
        assert_eq!(cfg.default_caller.as_str(), "user2");
        assert_eq!(cfg.identity_header.as_deref(), Some("x-user-id"));
        assert_eq!(cfg.actions, vec![RequestKind::CountSubscribers]);
    }

    #[test]
    fn zero_pulse_interval_is_clamped() {
        let settings = ServerSettings {
            pulse_interval_ms: 0,
            ..ServerSettings::default()
        };
        assert_eq!(ServerConfig::from(&settings).pulse_interval, Duration::from_millis(1));
    }
}
