//! REST API endpoints for morsetap
//!
//! All endpoints are under /api/v1/ and return JSON. Signal pushes are
//! validated at this boundary; malformed or out-of-range payloads are
//! rejected instead of being coerced.

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use chrono::{DateTime, Utc};
use morsetap_core::signal::store::active_actor_window;
use morsetap_core::{InputEvent, SignalRecord, TapSource, MAX_SIGNAL_VALUE};
use serde::{Deserialize, Serialize};

/// Application status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    /// "Idle" or "Accumulating"
    pub state: String,
    /// Taps in the currently open burst
    pub count: u32,
    pub window_ms: u32,
    pub trigger_key: String,
    /// Actor id attached to locally emitted signals
    pub actor_id: String,
}

/// One signal on the wire
#[derive(Serialize, Clone)]
pub struct SignalResponse {
    pub value: u8,
    pub actor_id: String,
    /// Timestamp as ISO 8601 string
    pub timestamp: String,
}

impl From<&SignalRecord> for SignalResponse {
    fn from(record: &SignalRecord) -> Self {
        Self {
            value: record.value,
            actor_id: record.actor_id.clone(),
            timestamp: record.timestamp.to_rfc3339(),
        }
    }
}

/// Signal history response
#[derive(Serialize)]
pub struct SignalsResponse {
    pub signals: Vec<SignalResponse>,
    /// Distinct actors seen in the trailing window
    pub active_actors: usize,
    pub total_recorded: u64,
    pub total_clamped: u64,
}

/// Signal push request; the sink's input record
#[derive(Deserialize)]
pub struct SignalPush {
    pub value: u8,
    pub actor_id: String,
    /// Defaults to now when omitted
    pub timestamp: Option<DateTime<Utc>>,
}

/// Clear response
#[derive(Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

/// Configuration response
#[derive(Serialize, Deserialize)]
pub struct ConfigResponse {
    pub window_ms: u32,
    pub trigger_key: String,
}

/// Configuration update request
#[derive(Deserialize)]
pub struct ConfigUpdate {
    pub window_ms: Option<u32>,
    pub trigger_key: Option<String>,
}

/// Tap injection response
#[derive(Serialize)]
pub struct TapResponse {
    /// Whether the event qualified as a tap
    pub matched: bool,
    /// Source label when it did
    pub source: Option<TapSource>,
    /// Taps in the burst after this event
    pub count: u32,
}

/// Remote URL response
#[derive(Serialize)]
pub struct RemoteUrlResponse {
    pub url: String,
}

/// Validate a pushed signal record at the boundary.
fn validate_push(push: &SignalPush) -> Result<(), String> {
    if push.value < 1 || push.value > MAX_SIGNAL_VALUE {
        return Err(format!(
            "value must be between 1 and {}, got {}",
            MAX_SIGNAL_VALUE, push.value
        ));
    }
    if push.actor_id.trim().is_empty() {
        return Err("actor_id must not be blank".to_string());
    }
    if push.actor_id.len() > 64 {
        return Err("actor_id too long (max 64 characters)".to_string());
    }
    Ok(())
}

/// GET /api/v1/status
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let status = state
        .session
        .status()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(StatusResponse {
        version: morsetap_core::VERSION.to_string(),
        state: if status.accumulating {
            "Accumulating".to_string()
        } else {
            "Idle".to_string()
        },
        count: status.count,
        window_ms: status.window_ms,
        trigger_key: status.trigger_key,
        actor_id: state.actor_id.to_string(),
    }))
}

/// GET /api/v1/signals
pub async fn get_signals(State(state): State<AppState>) -> Json<SignalsResponse> {
    // Extract everything in a block so the guard drops before any await
    let (signals, active_actors, total_recorded, total_clamped) = {
        let store = state.store.lock().unwrap();
        let signals: Vec<SignalResponse> =
            store.recent(100).iter().map(SignalResponse::from).collect();
        (
            signals,
            store.active_actors(active_actor_window()),
            store.total_recorded(),
            store.total_clamped(),
        )
    };

    Json(SignalsResponse {
        signals,
        active_actors,
        total_recorded,
        total_clamped,
    })
}

/// POST /api/v1/signals
///
/// The signal-sink push: records a value emitted elsewhere. Rejects
/// malformed payloads with 422 instead of coercing them.
pub async fn push_signal(
    State(state): State<AppState>,
    Json(push): Json<SignalPush>,
) -> Result<(StatusCode, Json<SignalResponse>), (StatusCode, String)> {
    validate_push(&push).map_err(|msg| (StatusCode::UNPROCESSABLE_ENTITY, msg))?;

    let record = SignalRecord {
        value: push.value,
        actor_id: push.actor_id,
        timestamp: push.timestamp.unwrap_or_else(Utc::now),
    };
    {
        let mut store = state
            .store
            .lock()
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "store unavailable".to_string()))?;
        store.record(record.clone());
    }
    crate::ws::broadcast_signal(&state, &record);

    Ok((StatusCode::CREATED, Json(SignalResponse::from(&record))))
}

/// DELETE /api/v1/signals
///
/// Clears the shared history for every connected observer.
pub async fn clear_signals(State(state): State<AppState>) -> Json<ClearResponse> {
    if let Ok(mut store) = state.store.lock() {
        store.clear();
        Json(ClearResponse {
            success: true,
            message: "Signal history cleared.".to_string(),
        })
    } else {
        Json(ClearResponse {
            success: false,
            message: "Failed to acquire lock on signal store.".to_string(),
        })
    }
}

/// GET /api/v1/config
pub async fn get_config(
    State(state): State<AppState>,
) -> Result<Json<ConfigResponse>, (StatusCode, String)> {
    let status = state
        .session
        .status()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ConfigResponse {
        window_ms: status.window_ms,
        trigger_key: status.trigger_key,
    }))
}

/// PATCH /api/v1/config
///
/// Partial update; out-of-range windows are clamped, the reply reports the
/// effective values.
pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<ConfigResponse>, (StatusCode, String)> {
    let current = state
        .session
        .status()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let window_ms = update.window_ms.unwrap_or(current.window_ms);
    let trigger_key = update.trigger_key.unwrap_or(current.trigger_key);

    state
        .session
        .configure(window_ms, trigger_key)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let status = state
        .session
        .status()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ConfigResponse {
        window_ms: status.window_ms,
        trigger_key: status.trigger_key,
    }))
}

/// POST /api/v1/tap
///
/// Injects a raw input event through trigger matching.
pub async fn post_tap(
    State(state): State<AppState>,
    Json(event): Json<InputEvent>,
) -> Result<Json<TapResponse>, (StatusCode, String)> {
    let source = state
        .session
        .input(event)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let status = state
        .session
        .status()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(TapResponse {
        matched: source.is_some(),
        source,
        count: status.count,
    }))
}

/// GET /api/v1/remote-url
///
/// Returns the URL for reaching this server from other devices on the LAN.
pub async fn get_remote_url(State(state): State<AppState>) -> Json<RemoteUrlResponse> {
    let ip = local_ip_address::local_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|_| "localhost".to_string());
    Json(RemoteUrlResponse {
        url: format!("http://{}:{}", ip, state.config.port),
    })
}
