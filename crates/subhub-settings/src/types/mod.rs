//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may be partial: missing fields keep their compiled default.

mod logging;
mod server;

pub use logging::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use subhub_core::IdentitySeed;

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 3001, "subscribeDelayMs": 0 },
///   "identities": [{ "id": "alice", "displayName": "Alice" }]
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubhubSettings {
    /// Listener, session and latency settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
    /// Identity population loaded into the registry at startup.
    pub identities: Vec<IdentitySeed>,
}

impl Default for SubhubSettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            identities: default_identities(),
        }
    }
}

/// The stock population: `user1`..`user3`.
pub fn default_identities() -> Vec<IdentitySeed> {
    (1..=3)
        .map(|n| IdentitySeed::new(format!("user{n}"), format!("User {n}")))
        .collect()
}
