use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    Authenticate = 0x01,
    JoinRoom = 0x02,
    LeaveRoom = 0x03,
    SendMessage = 0x04,

    // Server -> Client
    Status = 0x10,
    MessageReceived = 0x11,
    Error = 0x12,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::Authenticate),
            0x02 => Some(Self::JoinRoom),
            0x03 => Some(Self::LeaveRoom),
            0x04 => Some(Self::SendMessage),
            0x10 => Some(Self::Status),
            0x11 => Some(Self::MessageReceived),
            0x12 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Operation a client-visible failure is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    Auth,
    Join,
    Leave,
    Send,
}

/// Reason codes carried by `Error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    InvalidToken,
    AuthTimeout,
    ProtocolMismatch,
    Unauthenticated,
    NotAMember,
    RoomNotFound,
    NotInRoom,
    EmptyBody,
    InvalidBody,
    RateLimited,
}

impl ErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid_token",
            Self::AuthTimeout => "auth_timeout",
            Self::ProtocolMismatch => "protocol_mismatch",
            Self::Unauthenticated => "unauthenticated",
            Self::NotAMember => "not_a_member",
            Self::RoomNotFound => "room_not_found",
            Self::NotInRoom => "not_in_room",
            Self::EmptyBody => "empty_body",
            Self::InvalidBody => "invalid_body",
            Self::RateLimited => "rate_limited",
        }
    }
}

/// Payload of an `Authenticate` request. A `protocol_version` of 0 means the
/// client did not declare one and is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateMsg {
    pub credential: String,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRoomMsg {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageMsg {
    pub body: String,
}

/// Informational notice, e.g. "Alice joined liverpool-fans".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMsg {
    pub text: String,
}

/// The ordered chat payload fanned out to room members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceivedMsg {
    pub message: ChatMessage,
}

/// A scoped failure event. The connection remains usable unless the scope's
/// semantics say otherwise (only auth timeouts and protocol mismatches close
/// it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub scope: ErrorScope,
    pub reason: ErrorReason,
}

/// A decoded client-to-server event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Authenticate(AuthenticateMsg),
    JoinRoom(JoinRoomMsg),
    LeaveRoom(LeaveRoomMsg),
    SendMessage(SendMessageMsg),
}

impl ClientEvent {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Authenticate(_) => MessageType::Authenticate,
            Self::JoinRoom(_) => MessageType::JoinRoom,
            Self::LeaveRoom(_) => MessageType::LeaveRoom,
            Self::SendMessage(_) => MessageType::SendMessage,
        }
    }
}

/// A server-to-client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Status(StatusMsg),
    MessageReceived(MessageReceivedMsg),
    Error(ErrorMsg),
}

impl ServerEvent {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Status(_) => MessageType::Status,
            Self::MessageReceived(_) => MessageType::MessageReceived,
            Self::Error(_) => MessageType::Error,
        }
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self::Status(StatusMsg { text: text.into() })
    }

    pub fn error(scope: ErrorScope, reason: ErrorReason) -> Self {
        Self::Error(ErrorMsg { scope, reason })
    }
}
