//! # subhub-settings
//!
//! Layered configuration for the subscription hub.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SubhubSettings::default()`]
//! 2. **Settings file**: `~/.subhub/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SUBHUB_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let settings = SubhubSettings::default();
        assert!(settings_path().ends_with("settings.json"));
        assert_eq!(settings.logging.format, LogFormat::Pretty);
    }
}
