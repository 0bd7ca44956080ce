//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SubhubSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `SUBHUB_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{LogFormat, SubhubSettings};

/// Resolve the default settings path (`~/.subhub/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".subhub").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SubhubSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid merged result
/// is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SubhubSettings> {
    let defaults = serde_json::to_value(SubhubSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: SubhubSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `SUBHUB_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut SubhubSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning, keeping the file/default value.
pub fn apply_overrides(settings: &mut SubhubSettings, lookup: impl Fn(&str) -> Option<String>) {
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let ranged = |name: &str, min: u64, max: u64| {
        let val = string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("SUBHUB_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = ranged("SUBHUB_PORT", 0, 65_535) {
        settings.server.port = u16::try_from(v).unwrap_or(settings.server.port);
    }
    if let Some(v) = ranged("SUBHUB_MAX_CONNECTIONS", 1, 1_000_000) {
        settings.server.max_connections = usize::try_from(v).unwrap_or(usize::MAX);
    }
    if let Some(v) = ranged("SUBHUB_PULSE_INTERVAL_MS", 1, 3_600_000) {
        settings.server.pulse_interval_ms = v;
    }
    if let Some(v) = ranged("SUBHUB_SUBSCRIBE_DELAY_MS", 0, 600_000) {
        settings.server.subscribe_delay_ms = v;
    }
    if let Some(v) = ranged("SUBHUB_UNSUBSCRIBE_DELAY_MS", 0, 600_000) {
        settings.server.unsubscribe_delay_ms = v;
    }
    if let Some(v) = string("SUBHUB_DEFAULT_CALLER") {
        settings.server.default_caller = v;
    }
    if let Some(v) = string("SUBHUB_IDENTITY_HEADER") {
        settings.server.identity_header = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("SUBHUB_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = string("SUBHUB_LOG_FORMAT") {
        match parse_log_format(&v) {
            Some(format) => settings.logging.format = format,
            None => warn!(key = "SUBHUB_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

/// Reject settings the server cannot run with.
pub fn validate(settings: &SubhubSettings) -> Result<()> {
    if settings.identities.is_empty() {
        return Err(SettingsError::InvalidValue("no identities configured".into()));
    }
    if settings.server.pulse_interval_ms == 0 {
        return Err(SettingsError::InvalidValue("pulseIntervalMs must be > 0".into()));
    }
    if settings.server.max_send_queue == 0 {
        return Err(SettingsError::InvalidValue("maxSendQueue must be > 0".into()));
    }
    if settings.server.default_caller.is_empty() {
        return Err(SettingsError::InvalidValue("defaultCaller must not be empty".into()));
    }
    let mut seen = HashSet::new();
    for seed in &settings.identities {
        if seed.id.as_str().is_empty() {
            return Err(SettingsError::InvalidValue("identity id must not be empty".into()));
        }
        if !seen.insert(seed.id.as_str()) {
            warn!(id = %seed.id, "duplicate identity in settings, keeping the first");
        }
    }
    Ok(())
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a log format name (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.to_lowercase().as_str() {
        "pretty" | "text" => Some(LogFormat::Pretty),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}
