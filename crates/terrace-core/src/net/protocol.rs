use serde::{Deserialize, Serialize};

use super::messages::{
    AuthenticateMsg, ClientEvent, ErrorMsg, JoinRoomMsg, LeaveRoomMsg, MessageReceivedMsg,
    MessageType, SendMessageMsg, ServerEvent, StatusMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientEvent` to wire format.
pub fn encode_client_event(event: &ClientEvent) -> Result<Vec<u8>, ProtocolError> {
    match event {
        ClientEvent::Authenticate(m) => encode_message(MessageType::Authenticate, m),
        ClientEvent::JoinRoom(m) => encode_message(MessageType::JoinRoom, m),
        ClientEvent::LeaveRoom(m) => encode_message(MessageType::LeaveRoom, m),
        ClientEvent::SendMessage(m) => encode_message(MessageType::SendMessage, m),
    }
}

/// Encode a `ServerEvent` to wire format.
pub fn encode_server_event(event: &ServerEvent) -> Result<Vec<u8>, ProtocolError> {
    match event {
        ServerEvent::Status(m) => encode_message(MessageType::Status, m),
        ServerEvent::MessageReceived(m) => encode_message(MessageType::MessageReceived, m),
        ServerEvent::Error(m) => encode_message(MessageType::Error, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientEvent`.
pub fn decode_client_event(data: &[u8]) -> Result<ClientEvent, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::Authenticate => Ok(ClientEvent::Authenticate(
            decode_payload::<AuthenticateMsg>(data)?,
        )),
        MessageType::JoinRoom => Ok(ClientEvent::JoinRoom(decode_payload::<JoinRoomMsg>(data)?)),
        MessageType::LeaveRoom => Ok(ClientEvent::LeaveRoom(decode_payload::<LeaveRoomMsg>(
            data,
        )?)),
        MessageType::SendMessage => Ok(ClientEvent::SendMessage(
            decode_payload::<SendMessageMsg>(data)?,
        )),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerEvent`.
pub fn decode_server_event(data: &[u8]) -> Result<ServerEvent, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::Status => Ok(ServerEvent::Status(decode_payload::<StatusMsg>(data)?)),
        MessageType::MessageReceived => Ok(ServerEvent::MessageReceived(decode_payload::<
            MessageReceivedMsg,
        >(data)?)),
        MessageType::Error => Ok(ServerEvent::Error(decode_payload::<ErrorMsg>(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
