//! Request dispatch: validation, artificial latency, registry access.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use subhub_core::validation::validate;
use subhub_core::{IdentityId, OutboundMessage, ProtocolError, Registry, RequestKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::LatencyProfile;

/// Result of handling one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleResult {
    /// Send this frame back to the client.
    Reply(OutboundMessage),
    /// The connection closed while the request was pending. Nothing was
    /// applied and nothing should be sent.
    Abandoned,
}

/// Routes validated requests to the registry on behalf of a caller.
pub struct Dispatcher {
    registry: Arc<Registry>,
    latency: LatencyProfile,
    actions: HashSet<RequestKind>,
}

impl Dispatcher {
    /// Dispatcher that handles every request kind.
    pub fn new(registry: Arc<Registry>, latency: LatencyProfile) -> Self {
        Self {
            registry,
            latency,
            actions: RequestKind::ALL.into_iter().collect(),
        }
    }

    /// Restrict the handled request kinds. Others get `UnsupportedAction`.
    #[must_use]
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = RequestKind>) -> Self {
        self.actions = actions.into_iter().collect();
        self
    }

    /// Whether `kind` is handled.
    pub fn supports(&self, kind: RequestKind) -> bool {
        self.actions.contains(&kind)
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Handle one inbound text frame for `caller`.
    ///
    /// Every outcome except [`HandleResult::Abandoned`] produces exactly one
    /// reply frame.
    #[instrument(skip_all, fields(caller = %caller, kind))]
    pub async fn handle(
        &self,
        caller: &IdentityId,
        text: &str,
        cancel: &CancellationToken,
    ) -> HandleResult {
        match self.process(caller, text, cancel).await {
            Ok(Some(reply)) => HandleResult::Reply(reply),
            Ok(None) => {
                debug!("request abandoned on close");
                HandleResult::Abandoned
            }
            Err(err) => HandleResult::Reply(self.reject(&err)),
        }
    }

    /// Error reply for a frame that failed before or during handling.
    pub fn reject(&self, err: &ProtocolError) -> OutboundMessage {
        counter!("request_errors_total", "code" => err.code()).increment(1);
        warn!(code = err.code(), error = %err, "request failed");
        OutboundMessage::error(err)
    }

    async fn process(
        &self,
        caller: &IdentityId,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<OutboundMessage>, ProtocolError> {
        let request = validate(text)?;
        let (kind, target) = (request.kind, request.target);
        let _ = tracing::Span::current().record("kind", kind.as_str());
        counter!("requests_total", "kind" => kind.as_str()).increment(1);

        if !self.supports(kind) {
            return Err(ProtocolError::UnsupportedAction);
        }

        if !pause(self.latency.for_kind(kind), cancel).await {
            return Ok(None);
        }

        let reply = match kind {
            RequestKind::Subscribe => {
                let outcome = self.registry.subscribe(caller, &target)?;
                debug!(target = %target, ?outcome, "subscribed");
                OutboundMessage::subscribed()
            }
            RequestKind::Unsubscribe => {
                let outcome = self.registry.unsubscribe(caller, &target)?;
                debug!(target = %target, ?outcome, "unsubscribed");
                OutboundMessage::unsubscribed()
            }
            RequestKind::CountSubscribers => {
                OutboundMessage::subscriber_count(self.registry.count_subscribers(&target)?)
            }
        };
        Ok(Some(reply))
    }
}

/// Sleep for `delay` unless `cancel` fires first. Returns `false` when
/// cancelled.
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}
