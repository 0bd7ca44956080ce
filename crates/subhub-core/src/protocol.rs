//! JSON wire frames.
//!
//! Inbound: `{ "type": "Subscribe" | "Unsubscribe" | "CountSubscribers", "userId": "..." }`
//! where `userId` names the target identity. Outbound frames always carry
//! `type` and `updatedAt` (epoch milliseconds) plus a per-type payload.

use serde::{Deserialize, Serialize};

use crate::errors::ProtocolError;

/// Request kinds a client may send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Add the caller to the target's subscribers.
    Subscribe,
    /// Remove the caller from the target's subscribers.
    Unsubscribe,
    /// Ask for the target's subscriber count.
    CountSubscribers,
}

impl RequestKind {
    /// Every request kind, in wire order.
    pub const ALL: [Self; 3] = [Self::Subscribe, Self::Unsubscribe, Self::CountSubscribers];

    /// Wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "Subscribe",
            Self::Unsubscribe => "Unsubscribe",
            Self::CountSubscribers => "CountSubscribers",
        }
    }

    /// Parse a wire name. Case-sensitive.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound frame types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameType {
    /// Subscribe succeeded.
    Subscribe,
    /// Unsubscribe succeeded.
    Unsubscribe,
    /// Subscriber count.
    CountSubscribers,
    /// Periodic liveness pulse.
    Heartbeat,
    /// Any failure.
    Error,
}

/// A frame sent from server to client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    /// Frame type.
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    /// Epoch milliseconds when the frame was built.
    pub updated_at: i64,
    /// `Subscribed` / `Unsubscribed` on success frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Subscriber count on `CountSubscribers` frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    /// Human-readable message on `Error` frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable code on `Error` frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Current time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl OutboundMessage {
    fn bare(frame_type: FrameType) -> Self {
        Self {
            frame_type,
            updated_at: now_ms(),
            status: None,
            count: None,
            error: None,
            code: None,
        }
    }

    /// `{type: "Subscribe", status: "Subscribed"}`
    pub fn subscribed() -> Self {
        Self {
            status: Some("Subscribed".into()),
            ..Self::bare(FrameType::Subscribe)
        }
    }

    /// `{type: "Unsubscribe", status: "Unsubscribed"}`
    pub fn unsubscribed() -> Self {
        Self {
            status: Some("Unsubscribed".into()),
            ..Self::bare(FrameType::Unsubscribe)
        }
    }

    /// `{type: "CountSubscribers", count}`
    pub fn subscriber_count(count: usize) -> Self {
        Self {
            count: Some(count),
            ..Self::bare(FrameType::CountSubscribers)
        }
    }

    /// `{type: "Heartbeat"}`
    pub fn heartbeat() -> Self {
        Self::bare(FrameType::Heartbeat)
    }

    /// `{type: "Error", error, code}`
    pub fn error(err: &ProtocolError) -> Self {
        Self {
            error: Some(err.to_string()),
            code: Some(err.code().to_owned()),
            ..Self::bare(FrameType::Error)
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
