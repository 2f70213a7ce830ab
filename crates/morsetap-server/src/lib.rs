//! Morsetap Web Server - Axum REST + WebSocket
//!
//! Exposes the shared signal surface around a tap session: pushing and
//! reading emitted signals, live fan-out to connected clients, and the
//! window/trigger configuration endpoints.

pub mod api;
pub mod ws;

use std::sync::{Arc, Mutex};

use axum::Router;
use morsetap_core::{ActorId, SessionHandle, SignalStore};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    /// Handle to the tap session actor
    pub session: SessionHandle,
    /// Shared signal history
    pub store: Arc<Mutex<SignalStore>>,
    /// Identity attached to locally finalized bursts
    pub actor_id: ActorId,
    /// WebSocket broadcast channel
    pub ws_tx: broadcast::Sender<String>,
    /// Server configuration
    pub config: ServerConfig,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8930,
            bind_addr: "0.0.0.0".to_string(),
        }
    }
}

impl AppState {
    /// Create a new AppState around a session handle and signal store
    pub fn new(
        session: SessionHandle,
        store: Arc<Mutex<SignalStore>>,
        config: ServerConfig,
    ) -> Self {
        let (ws_tx, _) = broadcast::channel(256);
        Self {
            session,
            store,
            actor_id: ActorId::generate(),
            ws_tx,
            config,
        }
    }
}

/// Forward finalized bursts into the store and out to WebSocket clients.
///
/// Push or fan-out failures are logged and dropped; they never reach back
/// into the session.
pub fn spawn_signal_forwarder(state: AppState) -> tokio::task::JoinHandle<()> {
    let mut outcomes = state.session.subscribe();
    tokio::spawn(async move {
        loop {
            match outcomes.recv().await {
                Ok(outcome) => {
                    let record = match state.store.lock() {
                        Ok(mut store) => store.record_outcome(&outcome, state.actor_id.as_str()),
                        Err(_) => {
                            tracing::error!("signal store lock poisoned, dropping signal");
                            continue;
                        }
                    };
                    tracing::info!(
                        value = record.value,
                        raw_count = outcome.raw_count,
                        clamped = outcome.clamped,
                        "signal recorded"
                    );
                    ws::broadcast_signal(&state, &record);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "signal forwarder lagged behind session");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("signal forwarder stopped");
    })
}

/// Build the Axum router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // REST API
        .route("/api/v1/status", axum::routing::get(api::get_status))
        .route(
            "/api/v1/signals",
            axum::routing::get(api::get_signals)
                .post(api::push_signal)
                .delete(api::clear_signals),
        )
        .route(
            "/api/v1/config",
            axum::routing::get(api::get_config).patch(api::update_config),
        )
        .route("/api/v1/tap", axum::routing::post(api::post_tap))
        .route("/api/v1/remote-url", axum::routing::get(api::get_remote_url))
        // WebSocket
        .route("/api/v1/ws", axum::routing::get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve requests on an already-bound listener
pub async fn serve_on(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the web server on the configured address
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.bind_addr, state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Morsetap web server listening");
    serve_on(listener, state).await
}
