use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use terrace_core::message::ChatMessage;
use terrace_core::time;
use terrace_core::user::UserIdentity;

use crate::broadcaster::RoomBroadcaster;

/// Default cap on retained messages per room before oldest are evicted.
const DEFAULT_MAX_STORED_MESSAGES: usize = 10_000;

/// Why an append was rejected. Rejected appends have no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendError {
    /// Body was empty after trimming.
    EmptyBody,
}

impl std::fmt::Display for AppendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyBody => write!(f, "message body is empty"),
        }
    }
}

impl std::error::Error for AppendError {}

struct RoomLog {
    next_sequence: u64,
    messages: VecDeque<ChatMessage>,
}

impl RoomLog {
    fn new() -> Self {
        Self {
            next_sequence: 1,
            messages: VecDeque::new(),
        }
    }

    fn append(
        &mut self,
        room_id: &str,
        user: &UserIdentity,
        body: &str,
        cap: usize,
    ) -> Result<ChatMessage, AppendError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(AppendError::EmptyBody);
        }
        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            user_id: user.id,
            display_name: user.display_name.clone(),
            body: body.to_string(),
            sequence: self.next_sequence,
            created_at: time::timestamp_now(),
        };
        self.next_sequence += 1;
        self.messages.push_back(message.clone());
        while self.messages.len() > cap {
            self.messages.pop_front();
        }
        Ok(message)
    }
}

/// Strictly ordered per-room append-only record of chat messages.
///
/// Each room has its own lock and sequence counter: appends within one room
/// are linearized, appends to different rooms proceed independently.
/// History reads are paginated most-recent-first and always reflect every
/// append that completed before the read started.
pub struct MessageLog {
    rooms: RwLock<HashMap<String, Arc<Mutex<RoomLog>>>>,
    max_stored: usize,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_STORED_MESSAGES)
    }

    /// Create a MessageLog with a configurable per-room retention cap.
    pub fn with_capacity(max_stored: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            max_stored,
        }
    }

    async fn room(&self, room_id: &str) -> Arc<Mutex<RoomLog>> {
        if let Some(room) = self.rooms.read().await.get(room_id) {
            return Arc::clone(room);
        }
        let mut rooms = self.rooms.write().await;
        Arc::clone(
            rooms
                .entry(room_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(RoomLog::new()))),
        )
    }

    /// Append one message. The room's lock is the serialization point for
    /// sequence assignment.
    pub async fn append(
        &self,
        room_id: &str,
        user: &UserIdentity,
        body: &str,
    ) -> Result<ChatMessage, AppendError> {
        let room = self.room(room_id).await;
        let mut log = room.lock().await;
        log.append(room_id, user, body, self.max_stored)
    }

    /// Append and fan the message out to the room's current members without
    /// releasing the room's lock in between. A member that receives the
    /// message live will always find it in a subsequent `history` read, and
    /// no member can observe two messages from one room out of sequence
    /// order.
    pub async fn append_and_publish(
        &self,
        room_id: &str,
        user: &UserIdentity,
        body: &str,
        broadcaster: &RoomBroadcaster,
    ) -> Result<ChatMessage, AppendError> {
        let room = self.room(room_id).await;
        let mut log = room.lock().await;
        let message = log.append(room_id, user, body, self.max_stored)?;
        broadcaster.publish(&message);
        Ok(message)
    }

    /// Read a page of history, most recent first. Offsets past the end of
    /// the log return an empty page, not an error.
    pub async fn history(&self, room_id: &str, limit: usize, offset: usize) -> Vec<ChatMessage> {
        let room = {
            let rooms = self.rooms.read().await;
            rooms.get(room_id).cloned()
        };
        let Some(room) = room else {
            return Vec::new();
        };
        let log = room.lock().await;
        log.messages
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Total messages currently retained for a room.
    pub async fn message_count(&self, room_id: &str) -> usize {
        let room = {
            let rooms = self.rooms.read().await;
            rooms.get(room_id).cloned()
        };
        match room {
            Some(room) => room.lock().await.messages.len(),
            None => 0,
        }
    }
}
