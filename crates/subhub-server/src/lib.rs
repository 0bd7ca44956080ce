//! # subhub-server
//!
//! Axum HTTP + `WebSocket` endpoint for the subscription hub.
//!
//! - HTTP endpoint: `/health`
//! - `WebSocket` sessions on any other path: pulses, ordered request dispatch
//! - Artificial per-request latency, abandoned when the connection closes
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod identity;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::{LatencyProfile, ServerConfig};
pub use server::SubhubServer;
