use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use terrace_core::message::ChatMessage;
use terrace_core::room::is_valid_room_id;
use terrace_core::user::UserIdentity;

use crate::error::AppError;
use crate::membership::JoinDenied;
use crate::state::AppState;

/// Query parameters for history pagination.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_history_limit() -> usize {
    50
}

/// One page of room history, most recent first.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub room_id: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct MessageCountResponse {
    pub room_id: String,
    pub count: usize,
}

/// Resolve the bearer credential on a REST request.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserIdentity, AppError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
    state
        .tokens
        .resolve(token)
        .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))
}

/// History is member-only, same as the live room.
fn authorize_room(state: &AppState, user: &UserIdentity, room_id: &str) -> Result<(), AppError> {
    if !is_valid_room_id(room_id) {
        return Err(AppError::BadRequest(format!("Invalid room id: {room_id}")));
    }
    state.gate.authorize(user, room_id).map_err(|denied| match denied {
        JoinDenied::RoomNotFound => AppError::NotFound(format!("Room {room_id} not found")),
        JoinDenied::NotAMember => {
            AppError::Forbidden("Not a member of this community".to_string())
        },
    })
}

/// GET /api/v1/rooms/{room_id}/messages — paginated history, newest first.
pub async fn room_history(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, AppError> {
    let user = authenticate(&state, &headers)?;
    authorize_room(&state, &user, &room_id)?;

    let limit = query.limit.min(state.config.limits.history_page_limit);
    let messages = state.log.history(&room_id, limit, query.offset).await;
    Ok(Json(HistoryResponse { room_id, messages }))
}

/// GET /api/v1/rooms/{room_id}/messages/count — total retained messages.
pub async fn room_message_count(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MessageCountResponse>, AppError> {
    let user = authenticate(&state, &headers)?;
    authorize_room(&state, &user, &room_id)?;

    let count = state.log.message_count(&room_id).await;
    Ok(Json(MessageCountResponse { room_id, count }))
}
