use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: usize,
    pub rooms: RoomInfo,
}

#[derive(Serialize)]
pub struct RoomInfo {
    pub active: usize,
    pub occupants: usize,
}

/// Structured health check endpoint. Returns server status, the live
/// connection count, and room occupancy as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.ws_connection_count.load(Ordering::Relaxed);
    let (active, occupants) = state.registry.stats();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections,
        rooms: RoomInfo { active, occupants },
    })
}

/// Readiness check — a server with no communities configured cannot admit
/// anyone, so it is not ready.
pub async fn readiness_check(State(state): State<AppState>) -> &'static str {
    if state.config.communities.is_empty() {
        return "not ready: no communities configured";
    }
    "ready"
}
