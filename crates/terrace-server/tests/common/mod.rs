use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use terrace_core::net::messages::{
    AuthenticateMsg, ClientEvent, JoinRoomMsg, LeaveRoomMsg, SendMessageMsg, ServerEvent,
};
use terrace_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_event, encode_client_event,
};

use terrace_server::build_app;
use terrace_server::config::{AuthFileConfig, CommunityConfig, ServerConfig};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

/// Communities used across the integration tests: liverpool-fans admits
/// users 1 and 2, arsenal-fans admits user 9, open-terrace admits anyone.
pub fn test_communities() -> Vec<CommunityConfig> {
    vec![
        CommunityConfig {
            id: "liverpool-fans".to_string(),
            open: false,
            members: vec![1, 2],
        },
        CommunityConfig {
            id: "arsenal-fans".to_string(),
            open: false,
            members: vec![9],
        },
        CommunityConfig {
            id: "open-terrace".to_string(),
            open: true,
            members: vec![],
        },
    ]
}

impl TestServer {
    /// Start a test server with no token secret and the standard communities.
    pub async fn new() -> Self {
        let config = ServerConfig {
            communities: test_communities(),
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    /// Start a test server requiring HMAC-signed credentials.
    pub async fn with_secret(secret: &str) -> Self {
        let config = ServerConfig {
            auth: AuthFileConfig {
                token_secret: Some(secret.to_string()),
                ..AuthFileConfig::default()
            },
            communities: test_communities(),
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _server: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientEvent over a WS stream.
pub async fn ws_send(stream: &mut WsStream, event: &ClientEvent) {
    let encoded = encode_client_event(event).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Read the next ServerEvent from a WS stream (5s timeout).
pub async fn ws_read(stream: &mut WsStream) -> ServerEvent {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return decode_server_event(&data).unwrap();
                },
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket event")
}

/// Try to read a ServerEvent, returning None on timeout or close.
pub async fn ws_try_read(stream: &mut WsStream, timeout_ms: u64) -> Option<ServerEvent> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Some(decode_server_event(&data).unwrap());
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                _ => continue,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Authenticate with the given credential and return the server's reply.
pub async fn ws_authenticate(stream: &mut WsStream, credential: &str) -> ServerEvent {
    ws_send(
        stream,
        &ClientEvent::Authenticate(AuthenticateMsg {
            credential: credential.to_string(),
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;
    ws_read(stream).await
}

/// Authenticate with an unsigned `id:name` credential, expecting success.
pub async fn ws_login(stream: &mut WsStream, id: u64, name: &str) {
    let reply = ws_authenticate(stream, &format!("{id}:{name}")).await;
    match reply {
        ServerEvent::Status(_) => {},
        other => panic!("Expected auth status, got: {other:?}"),
    }
}

/// Join a room and return the server's reply (join status or error).
pub async fn ws_join(stream: &mut WsStream, room_id: &str) -> ServerEvent {
    ws_send(
        stream,
        &ClientEvent::JoinRoom(JoinRoomMsg {
            room_id: room_id.to_string(),
        }),
    )
    .await;
    ws_read(stream).await
}

/// Leave a room and return the server's reply.
pub async fn ws_leave(stream: &mut WsStream, room_id: &str) -> ServerEvent {
    ws_send(
        stream,
        &ClientEvent::LeaveRoom(LeaveRoomMsg {
            room_id: room_id.to_string(),
        }),
    )
    .await;
    ws_read(stream).await
}

/// Send a chat message (fire and forget; fan-out echoes it back).
pub async fn ws_send_message(stream: &mut WsStream, body: &str) {
    ws_send(
        stream,
        &ClientEvent::SendMessage(SendMessageMsg {
            body: body.to_string(),
        }),
    )
    .await;
}

/// Compute an HMAC-SHA256 signed credential for a user.
pub fn make_signed_token(secret: &str, id: u64, name: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let payload = format!("{id}:{name}");
    let mut mac = <Hmac<Sha256>>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload.as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());
    format!("{payload}:{sig}")
}
