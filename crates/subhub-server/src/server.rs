//! `SubhubServer`: Axum HTTP + WebSocket listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use subhub_core::{ConnectionId, Registry};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::identity::CallerResolver;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::dispatch::Dispatcher;
use crate::websocket::session::{SessionOptions, run_ws_session};
use crate::websocket::tracker::ConnectionTracker;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Request dispatcher shared by all sessions.
    pub dispatcher: Arc<Dispatcher>,
    /// Live connections.
    pub tracker: Arc<ConnectionTracker>,
    /// One permit per admitted connection, held until its session ends.
    pub slots: Arc<Semaphore>,
    /// Caller identity resolution.
    pub resolver: Arc<CallerResolver>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
}

/// The subscription hub server.
pub struct SubhubServer {
    config: Arc<ServerConfig>,
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
    tracker: Arc<ConnectionTracker>,
    slots: Arc<Semaphore>,
    resolver: Arc<CallerResolver>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl SubhubServer {
    /// Create a new server over `registry`.
    pub fn new(config: ServerConfig, registry: Arc<Registry>) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&registry), config.latency)
            .with_actions(config.actions.iter().copied());
        let resolver = CallerResolver::from_config(&config);
        if !registry.contains(resolver.default_caller()) {
            warn!(
                caller = %resolver.default_caller(),
                "default caller is not a registered identity; its requests will fail"
            );
        }
        let slots = Semaphore::new(config.max_connections.min(Semaphore::MAX_PERMITS));
        Self {
            config: Arc::new(config),
            registry,
            dispatcher: Arc::new(dispatcher),
            tracker: Arc::new(ConnectionTracker::new()),
            slots: Arc::new(slots),
            resolver: Arc::new(resolver),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router.
    ///
    /// A WebSocket upgrade on any path opens a session; a plain
    /// `GET /health` reports liveness.
    pub fn router(&self) -> Router {
        let state = AppState {
            config: self.config.clone(),
            dispatcher: self.dispatcher.clone(),
            tracker: self.tracker.clone(),
            slots: self.slots.clone(),
            resolver: self.resolver.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .fallback(ws_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server terminated with error");
            }
        });

        info!(%addr, "subhub listening");
        Ok((addr, handle))
    }

    /// Get the identity registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get the connection tracker.
    pub fn tracker(&self) -> &Arc<ConnectionTracker> {
        &self.tracker
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health, unless the request is a WebSocket upgrade.
async fn health_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if let Ok(ws) = upgrade {
        return open_session(&state, &headers, ws);
    }
    let connections = state.tracker.connection_count().await;
    let identities = state.dispatcher.registry().len();
    Json(health::health_check(state.start_time, connections, identities)).into_response()
}

/// WebSocket upgrade on any path.
async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    open_session(&state, &headers, ws)
}

/// Admit the connection and hand the upgraded socket to a session.
///
/// The connection slot is taken before the upgrade and released when the
/// session ends, or when the upgrade never completes.
fn open_session(state: &AppState, headers: &HeaderMap, ws: WebSocketUpgrade) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }
    let Ok(slot) = Arc::clone(&state.slots).try_acquire_owned() else {
        warn!(limit = state.config.max_connections, "rejecting connection over limit");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };

    let caller = state.resolver.resolve(headers);
    match state.dispatcher.registry().display_name(&caller) {
        Some(name) => debug!(caller = %caller, name = %name, "caller resolved"),
        None => warn!(caller = %caller, "caller is not a registered identity"),
    }
    let connection_id = ConnectionId::new();
    let options = SessionOptions {
        pulse_interval: state.config.pulse_interval,
        max_send_queue: state.config.max_send_queue,
    };
    let dispatcher = state.dispatcher.clone();
    let tracker = state.tracker.clone();
    let shutdown = state.shutdown.token();

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            run_ws_session(
                socket,
                connection_id,
                caller,
                dispatcher,
                tracker,
                options,
                shutdown,
            )
            .await;
            drop(slot);
        })
        .into_response()
}
