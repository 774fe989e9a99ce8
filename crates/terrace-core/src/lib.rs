pub mod message;
pub mod net;
pub mod room;
pub mod time;
pub mod user;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::message::ChatMessage;
    use crate::user::UserIdentity;

    /// Create a test identity with the given id and display name.
    pub fn make_identity(id: u64, name: &str) -> UserIdentity {
        UserIdentity {
            id,
            display_name: name.to_string(),
        }
    }

    /// Create a chat message for `room_id` with the given sequence number.
    pub fn make_message(room_id: &str, sequence: u64, body: &str) -> ChatMessage {
        ChatMessage {
            id: format!("msg-{sequence}"),
            room_id: room_id.to_string(),
            user_id: 1,
            display_name: "Alice".to_string(),
            body: body.to_string(),
            sequence,
            created_at: "1754000000Z".to_string(),
        }
    }
}
