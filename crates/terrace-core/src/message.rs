use serde::{Deserialize, Serialize};

/// A chat message as appended to a room's log and delivered to its members.
///
/// Within a room, messages are totally ordered by `sequence`, and every
/// member observes them in that order. `created_at` is informational only;
/// it never participates in ordering. Messages are immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub user_id: u64,
    pub display_name: String,
    pub body: String,
    pub sequence: u64,
    pub created_at: String,
}
