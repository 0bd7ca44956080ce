//! WebSocket connection handling: per-connection state, pulses, request
//! dispatch, and session lifecycle.

pub mod connection;
pub mod dispatch;
pub mod pulse;
pub mod session;
pub mod tracker;
