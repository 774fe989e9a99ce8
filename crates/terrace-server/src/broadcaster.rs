use std::sync::Arc;

use bytes::Bytes;

use terrace_core::message::ChatMessage;
use terrace_core::net::messages::{MessageReceivedMsg, ServerEvent};
use terrace_core::net::protocol::encode_server_event;

use crate::registry::SessionRegistry;

/// Fans newly appended messages and room notices out to every connection
/// joined to a room at the instant of the call.
///
/// Delivery is best-effort per connection: the payload is encoded once and
/// offered to each member's bounded channel with `try_send`, so one slow or
/// broken connection never delays the rest of the room. Ordering within a
/// room comes from the message log's append serialization, not from here.
#[derive(Clone)]
pub struct RoomBroadcaster {
    registry: Arc<SessionRegistry>,
}

impl RoomBroadcaster {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `message` to every current member of its room, sender included.
    pub fn publish(&self, message: &ChatMessage) {
        let event = ServerEvent::MessageReceived(MessageReceivedMsg {
            message: message.clone(),
        });
        self.send_to_room(&message.room_id, &event);
    }

    /// Broadcast an informational status line to a room.
    pub fn publish_status(&self, room_id: &str, text: impl Into<String>) {
        self.send_to_room(room_id, &ServerEvent::status(text));
    }

    fn send_to_room(&self, room_id: &str, event: &ServerEvent) {
        let Ok(encoded) = encode_server_event(event) else {
            tracing::warn!(room = room_id, "Failed to encode room event");
            return;
        };
        let bytes = Bytes::from(encoded);
        for (conn_id, sender) in self.registry.room_senders(room_id) {
            if let Err(e) = sender.try_send(bytes.clone()) {
                tracing::debug!(
                    connection = %conn_id, room = room_id, error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }
}
