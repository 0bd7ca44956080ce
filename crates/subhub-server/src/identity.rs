//! Caller identity resolution at upgrade time.

use axum::http::{HeaderMap, HeaderName};
use subhub_core::IdentityId;
use tracing::warn;

use crate::config::ServerConfig;

/// Decides which identity a new connection acts as.
///
/// When an identity header is configured and present on the upgrade request,
/// its value names the caller. Otherwise every connection acts as the
/// configured default caller.
#[derive(Debug, Clone)]
pub struct CallerResolver {
    header: Option<HeaderName>,
    default_caller: IdentityId,
}

impl CallerResolver {
    /// Build a resolver. An invalid header name is logged and ignored.
    pub fn new(header: Option<&str>, default_caller: IdentityId) -> Self {
        let header = header.and_then(|name| match HeaderName::from_bytes(name.trim().as_bytes()) {
            Ok(h) => Some(h),
            Err(e) => {
                warn!(header = name, error = %e, "ignoring invalid identity header name");
                None
            }
        });
        Self {
            header,
            default_caller,
        }
    }

    /// Build a resolver from server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.identity_header.as_deref(), config.default_caller.clone())
    }

    /// Caller for a connection with the given upgrade headers.
    pub fn resolve(&self, headers: &HeaderMap) -> IdentityId {
        self.header
            .as_ref()
            .and_then(|name| headers.get(name))
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map_or_else(|| self.default_caller.clone(), IdentityId::from_raw)
    }

    /// The fallback caller.
    pub fn default_caller(&self) -> &IdentityId {
        &self.default_caller
    }
}
