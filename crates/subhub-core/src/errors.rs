//! Error taxonomy surfaced to clients as `Error` frames.

use crate::ids::IdentityId;

/// Malformed frame.
pub const MALFORMED_REQUEST: &str = "MALFORMED_REQUEST";
/// Required field missing for the requested action.
pub const MISSING_FIELD: &str = "MISSING_FIELD";
/// Caller or target is not registered.
pub const UNKNOWN_IDENTITY: &str = "UNKNOWN_IDENTITY";
/// Caller tried to subscribe to itself.
pub const SELF_SUBSCRIPTION: &str = "SELF_SUBSCRIPTION";
/// Recognized action that this server does not handle.
pub const UNSUPPORTED_ACTION: &str = "UNSUPPORTED_ACTION";
/// Underlying connection failed.
pub const TRANSPORT_FAULT: &str = "TRANSPORT_FAULT";

/// Failures of a single registry operation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No identity with this id is registered.
    #[error("User does not exist")]
    UnknownIdentity {
        /// The id that was looked up.
        id: IdentityId,
    },
    /// Caller and target are the same identity.
    #[error("You cannot subscribe to yourself")]
    SelfSubscription {
        /// The identity that tried to subscribe to itself.
        id: IdentityId,
    },
}

/// Everything a session can report back to its peer.
///
/// None of these end the session except `TransportFault`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Frame is not JSON, not an object, or names no known request kind.
    #[error("Bad formatted payload")]
    MalformedRequest,

    /// Frame has a known kind but lacks `userId`.
    #[error("Missing userId")]
    MissingField,

    /// Caller or target identity not present in the registry.
    #[error("User does not exist")]
    UnknownIdentity {
        /// The id that was looked up.
        id: IdentityId,
    },

    /// Subscribe where caller and target are the same.
    #[error("You cannot subscribe to yourself")]
    SelfSubscription,

    /// Known request kind that is disabled on this server.
    #[error("Requested method not implemented")]
    UnsupportedAction,

    /// Connection-level failure.
    #[error("Connection error: {0}")]
    TransportFault(String),
}

impl ProtocolError {
    /// Stable machine-readable code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedRequest => MALFORMED_REQUEST,
            Self::MissingField => MISSING_FIELD,
            Self::UnknownIdentity { .. } => UNKNOWN_IDENTITY,
            Self::SelfSubscription => SELF_SUBSCRIPTION,
            Self::UnsupportedAction => UNSUPPORTED_ACTION,
            Self::TransportFault(_) => TRANSPORT_FAULT,
        }
    }
}

impl From<RegistryError> for ProtocolError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownIdentity { id } => Self::UnknownIdentity { id },
            RegistryError::SelfSubscription { .. } => Self::SelfSubscription,
        }
    }
}
