//! Fabric webhook handlers
//!
//! These endpoints are called by the telephony fabric, not by tenants; they
//! carry no bearer token. The SIP-inbound handler must always answer with a
//! usable `agent_name` — a missing answer drops a live call — so it never
//! returns an error status.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::{debug, info};

use crate::inbound::{InboundCallRequest, RoomFinishedEvent};

use super::{ok, ApiState};

/// `POST /api/v1/webhooks/livekit/sip-inbound`
pub async fn sip_inbound(
    State(state): State<ApiState>,
    Json(request): Json<InboundCallRequest>,
) -> impl IntoResponse {
    info!(
        "📞 Inbound SIP webhook: {} -> {} (call {})",
        request.from_number, request.to_number, request.call_id
    );
    let response = state.inbound.route(&request).await;
    Json(response)
}

/// `POST /api/v1/webhooks/livekit/events`
///
/// Room lifecycle events; only room-finished variants carry work today,
/// everything else is acknowledged and dropped.
pub async fn room_events(
    State(state): State<ApiState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let event = payload.get("event").and_then(|e| e.as_str()).unwrap_or_default();

    match event {
        "room_finished" | "room.finished" | "room_closed" | "room.closed" => {
            let finished = RoomFinishedEvent {
                call_id: string_at(&payload, &["call_id"])
                    .or_else(|| string_at(&payload, &["room", "call_id"])),
                room_name: string_at(&payload, &["room_name"])
                    .or_else(|| string_at(&payload, &["room", "name"])),
                duration_secs: payload
                    .get("duration_secs")
                    .or_else(|| payload.get("duration"))
                    .and_then(|d| d.as_i64()),
                disconnect_reason: string_at(&payload, &["disconnect_reason"])
                    .or_else(|| string_at(&payload, &["reason"])),
            };
            state.inbound.handle_room_finished(&finished).await;
        }
        other => {
            debug!("Ignoring fabric event '{}'", other);
        }
    }

    ok(json!({}))
}

fn string_at(value: &serde_json::Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().map(String::from)
}
