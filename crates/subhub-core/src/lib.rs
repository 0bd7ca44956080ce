//! # subhub-core
//!
//! Domain types for the subscription hub.
//!
//! - [`registry`]: identity records and their subscriber sets
//! - [`validation`]: shape and payload checks for inbound frames
//! - [`protocol`]: inbound request kinds and outbound frame builders
//! - [`errors`]: the error taxonomy reported back to clients

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod protocol;
pub mod registry;
pub mod validation;

pub use errors::{ProtocolError, RegistryError};
pub use ids::{ConnectionId, IdentityId};
pub use protocol::{FrameType, OutboundMessage, RequestKind};
pub use registry::{Identity, IdentitySeed, Outcome, Registry};
pub use validation::Request;
