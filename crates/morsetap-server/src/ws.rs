//! WebSocket handler for real-time signal push
//!
//! Clients connect to /api/v1/ws, receive a history snapshot, then get
//! every newly recorded signal as it lands.

use crate::api::SignalResponse;
use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use morsetap_core::signal::store::active_actor_window;
use morsetap_core::SignalRecord;
use serde::Serialize;

/// Snapshot sent once on connect
#[derive(Serialize)]
struct SnapshotMessage {
    kind: &'static str,
    signals: Vec<SignalResponse>,
    active_actors: usize,
}

/// One newly recorded signal
#[derive(Serialize)]
struct SignalMessage {
    kind: &'static str,
    signal: SignalResponse,
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Build the history snapshot JSON (must not hold the lock across await)
fn build_snapshot_json(state: &AppState) -> Option<String> {
    let store = state.store.lock().ok()?;
    let signals: Vec<SignalResponse> = store.recent(20).iter().map(SignalResponse::from).collect();
    let active_actors = store.active_actors(active_actor_window());
    drop(store);

    serde_json::to_string(&SnapshotMessage {
        kind: "snapshot",
        signals,
        active_actors,
    })
    .ok()
}

/// Handle an individual WebSocket connection
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Send initial snapshot (lock is dropped before await)
    if let Some(json) = build_snapshot_json(&state) {
        let _ = ws_sender.send(Message::Text(json.into())).await;
    }

    // Subscribe to broadcast channel
    let mut rx = state.ws_tx.subscribe();

    // Spawn task to forward broadcast messages to this client
    let mut send_task = tokio::spawn(async move {
        while let Ok(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Spawn task to handle incoming messages (pings, close)
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    tracing::debug!("WebSocket client disconnected");
}

/// Broadcast a newly recorded signal to all connected WebSocket clients.
/// Called from the forwarder task and the push endpoint.
pub fn broadcast_signal(state: &AppState, record: &SignalRecord) {
    if state.ws_tx.receiver_count() == 0 {
        return;
    }

    let message = SignalMessage {
        kind: "signal",
        signal: SignalResponse::from(record),
    };
    if let Ok(json) = serde_json::to_string(&message) {
        let _ = state.ws_tx.send(json);
    }
}
