use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use terrace_core::net::messages::{ClientEvent, ErrorReason, ErrorScope, MessageType, ServerEvent};
use terrace_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_event, decode_message_type,
    encode_server_event,
};
use terrace_core::room::is_valid_room_id;
use terrace_core::user::UserIdentity;

use crate::message_log::AppendError;
use crate::registry::ConnectionId;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

/// Connection phase. A connection's operations are strictly ordered: this
/// task is the sole reader of its socket, so the machine advances one
/// inbound event at a time.
enum ConnState {
    Authenticating,
    Authenticated(UserIdentity),
    InRoom(UserIdentity, String),
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let conn_id: ConnectionId = Uuid::new_v4();
    let (ws_sender, mut ws_receiver) = socket.split();

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.connection_message_buffer);
    spawn_writer(ws_sender, rx);

    let last_state = read_loop(&mut ws_receiver, &state, conn_id, &tx).await;

    // Teardown runs on every exit path, is idempotent, and never fails:
    // unregister first so no broadcast can reach this connection, then tell
    // the vacated rooms.
    let vacated = state.registry.unregister(conn_id);
    if let ConnState::InRoom(user, _) = &last_state {
        for room_id in &vacated {
            state
                .broadcaster
                .publish_status(room_id, format!("{} left {room_id}", user.display_name));
        }
    }

    tracing::info!(connection = %conn_id, "Connection closed");
}

fn spawn_writer(mut ws_sender: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Bytes>) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
    });
}

/// Queue an event on this connection's own channel. Uses `try_send` so a
/// wedged writer cannot stall the read loop.
fn send_event(tx: &mpsc::Sender<Bytes>, event: &ServerEvent) {
    if let Ok(encoded) = encode_server_event(event) {
        let _ = tx.try_send(Bytes::from(encoded));
    }
}

fn send_error(tx: &mpsc::Sender<Bytes>, scope: ErrorScope, reason: ErrorReason) {
    send_event(tx, &ServerEvent::error(scope, reason));
}

/// Scope for an inbound frame we are rejecting without decoding. Frames that
/// do not carry a client request type get no error event.
fn request_scope(data: &[u8]) -> Option<ErrorScope> {
    match decode_message_type(data).ok()? {
        MessageType::Authenticate => Some(ErrorScope::Auth),
        MessageType::JoinRoom => Some(ErrorScope::Join),
        MessageType::LeaveRoom => Some(ErrorScope::Leave),
        MessageType::SendMessage => Some(ErrorScope::Send),
        _ => None,
    }
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    conn_id: ConnectionId,
    tx: &mpsc::Sender<Bytes>,
) -> ConnState {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);
    let auth_deadline =
        Instant::now() + Duration::from_secs(state.config.auth.handshake_timeout_secs);
    let mut conn = ConnState::Authenticating;

    loop {
        // Unauthenticated connections get a bounded window to present a
        // credential, then are closed.
        let next = if matches!(conn, ConnState::Authenticating) {
            match tokio::time::timeout_at(auth_deadline, ws_receiver.next()).await {
                Ok(next) => next,
                Err(_) => {
                    send_error(tx, ErrorScope::Auth, ErrorReason::AuthTimeout);
                    tracing::debug!(connection = %conn_id, "Authentication window elapsed");
                    return conn;
                },
            }
        } else {
            ws_receiver.next().await
        };

        let Some(Ok(msg)) = next else {
            return conn; // transport closed or errored
        };
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => return conn,
            _ => continue,
        };

        if !rate_limiter.allow() {
            // A dropped request still gets feedback, scoped by the type byte
            // (full decoding is not worth doing for a flooding client).
            if let Some(scope) = request_scope(&data) {
                send_error(tx, scope, ErrorReason::RateLimited);
            }
            tracing::warn!(connection = %conn_id, "Rate limited");
            continue;
        }
        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let event = match decode_client_event(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(connection = %conn_id, error = %e, "Undecodable client event");
                continue;
            },
        };

        conn = match event {
            ClientEvent::Authenticate(auth) => {
                if auth.protocol_version != 0 && auth.protocol_version != PROTOCOL_VERSION {
                    send_error(tx, ErrorScope::Auth, ErrorReason::ProtocolMismatch);
                    tracing::debug!(
                        connection = %conn_id,
                        client = auth.protocol_version,
                        server = PROTOCOL_VERSION,
                        "Protocol version mismatch"
                    );
                    return conn;
                }
                handle_authenticate(state, conn_id, tx, conn, &auth.credential)
            },
            ClientEvent::JoinRoom(join) => handle_join(state, conn_id, tx, conn, &join.room_id),
            ClientEvent::LeaveRoom(leave) => handle_leave(state, conn_id, tx, conn, &leave.room_id),
            ClientEvent::SendMessage(send) => {
                handle_send(state, conn_id, tx, conn, &send.body).await
            },
        };
    }
}

fn handle_authenticate(
    state: &AppState,
    conn_id: ConnectionId,
    tx: &mpsc::Sender<Bytes>,
    conn: ConnState,
    credential: &str,
) -> ConnState {
    if !matches!(conn, ConnState::Authenticating) {
        tracing::debug!(connection = %conn_id, "Ignoring re-authentication");
        return conn;
    }

    match state.tokens.resolve(credential) {
        Some(user) => {
            state.registry.register(conn_id, user.clone(), tx.clone());
            send_event(
                tx,
                &ServerEvent::status(format!("authenticated as {}", user.display_name)),
            );
            tracing::info!(connection = %conn_id, user = user.id, "Authenticated");
            ConnState::Authenticated(user)
        },
        None => {
            send_error(tx, ErrorScope::Auth, ErrorReason::InvalidToken);
            tracing::debug!(connection = %conn_id, "Credential rejected");
            conn
        },
    }
}

fn handle_join(
    state: &AppState,
    conn_id: ConnectionId,
    tx: &mpsc::Sender<Bytes>,
    conn: ConnState,
    room_id: &str,
) -> ConnState {
    let user = match &conn {
        ConnState::Authenticating => {
            // Only this join is refused; the connection may retry after
            // authenticating.
            send_error(tx, ErrorScope::Join, ErrorReason::Unauthenticated);
            return conn;
        },
        ConnState::Authenticated(user) | ConnState::InRoom(user, _) => user.clone(),
    };

    if !is_valid_room_id(room_id) {
        send_error(tx, ErrorScope::Join, ErrorReason::RoomNotFound);
        return conn;
    }

    // Authorize before touching any membership so a denied join leaves the
    // connection exactly where it was, including its current room.
    if let Err(denied) = state.gate.authorize(&user, room_id) {
        send_error(tx, ErrorScope::Join, denied.reason());
        tracing::debug!(
            connection = %conn_id,
            user = user.id,
            room = room_id,
            reason = denied.reason().as_str(),
            "Join denied"
        );
        return conn;
    }

    if let ConnState::InRoom(_, current) = &conn {
        if current.as_str() == room_id {
            // Rejoining the occupied room is a no-op; only the caller hears
            // about it.
            send_event(
                tx,
                &ServerEvent::status(format!("{} joined {room_id}", user.display_name)),
            );
            return conn;
        }
        state.registry.leave_room(conn_id, current);
        state
            .broadcaster
            .publish_status(current, format!("{} left {current}", user.display_name));
    }

    state.registry.join_room(conn_id, room_id);
    state
        .broadcaster
        .publish_status(room_id, format!("{} joined {room_id}", user.display_name));
    tracing::info!(connection = %conn_id, user = user.id, room = room_id, "Joined room");

    ConnState::InRoom(user, room_id.to_string())
}

fn handle_leave(
    state: &AppState,
    conn_id: ConnectionId,
    tx: &mpsc::Sender<Bytes>,
    conn: ConnState,
    room_id: &str,
) -> ConnState {
    match conn {
        ConnState::InRoom(user, current) if current == room_id => {
            state.registry.leave_room(conn_id, room_id);
            // The leaver is already out of the room's membership, so it gets
            // its own copy of the notice.
            let text = format!("{} left {room_id}", user.display_name);
            state.broadcaster.publish_status(room_id, text.clone());
            send_event(tx, &ServerEvent::status(text));
            tracing::info!(connection = %conn_id, user = user.id, room = room_id, "Left room");
            ConnState::Authenticated(user)
        },
        other => {
            send_error(tx, ErrorScope::Leave, ErrorReason::NotInRoom);
            other
        },
    }
}

async fn handle_send(
    state: &AppState,
    conn_id: ConnectionId,
    tx: &mpsc::Sender<Bytes>,
    conn: ConnState,
    body: &str,
) -> ConnState {
    let ConnState::InRoom(user, room_id) = &conn else {
        send_error(tx, ErrorScope::Send, ErrorReason::NotInRoom);
        return conn;
    };

    // A blank body is the log's call (empty_body); only non-blank bodies are
    // screened for size and control characters here.
    if !body.trim().is_empty()
        && (body.chars().count() > state.config.limits.max_body_chars
            || body.chars().any(|c| c.is_control() && c != '\n'))
    {
        send_error(tx, ErrorScope::Send, ErrorReason::InvalidBody);
        return conn;
    }

    match state
        .log
        .append_and_publish(room_id, user, body, &state.broadcaster)
        .await
    {
        Ok(message) => {
            tracing::debug!(
                connection = %conn_id,
                room = room_id.as_str(),
                sequence = message.sequence,
                "Message appended"
            );
        },
        Err(AppendError::EmptyBody) => {
            send_error(tx, ErrorScope::Send, ErrorReason::EmptyBody);
        },
    }
    conn
}
