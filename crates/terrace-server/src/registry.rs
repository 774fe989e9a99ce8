use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use terrace_core::user::UserIdentity;

/// Stable identifier for one client connection.
pub type ConnectionId = Uuid;

/// Per-connection sender for outbound encoded events. Bounded so a slow
/// client cannot exhaust memory; fan-out offers with `try_send` and skips a
/// full channel. Uses `Bytes` for zero-copy cloning across members.
pub type ConnectionSender = mpsc::Sender<Bytes>;

struct ConnectionEntry {
    user: UserIdentity,
    sender: ConnectionSender,
    /// Rooms this connection currently occupies. The lifecycle manager keeps
    /// this at cardinality 0 or 1; the set representation keeps `unregister`
    /// total if that rule ever changes.
    rooms: HashSet<String>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

/// Tracks which connection belongs to which authenticated user and which
/// room each connection currently occupies.
///
/// Rooms exist only as presence: an entry appears on first join and is
/// dropped when the last member leaves. All operations take short critical
/// sections under one lock, so a membership snapshot taken for a broadcast
/// can never interleave with a half-applied join or teardown. Operations on
/// ids that were never registered (or already unregistered) are no-ops,
/// which makes duplicate disconnect events harmless.
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Record an authenticated connection and its outbound channel.
    pub fn register(&self, id: ConnectionId, user: UserIdentity, sender: ConnectionSender) {
        let mut inner = self.inner.write().unwrap();
        inner.connections.insert(
            id,
            ConnectionEntry {
                user,
                sender,
                rooms: HashSet::new(),
            },
        );
    }

    /// Add a connection to a room. Idempotent: joining a room the connection
    /// already occupies is a no-op, and unknown connection ids are ignored.
    pub fn join_room(&self, id: ConnectionId, room_id: &str) {
        let mut inner = self.inner.write().unwrap();
        let Some(entry) = inner.connections.get_mut(&id) else {
            return;
        };
        if !entry.rooms.insert(room_id.to_string()) {
            return;
        }
        inner.rooms.entry(room_id.to_string()).or_default().insert(id);
    }

    /// Remove a connection from a room. No-op for unknown ids or rooms the
    /// connection never joined. An emptied room is discarded.
    pub fn leave_room(&self, id: ConnectionId, room_id: &str) {
        let mut inner = self.inner.write().unwrap();
        let Some(entry) = inner.connections.get_mut(&id) else {
            return;
        };
        if !entry.rooms.remove(room_id) {
            return;
        }
        remove_member(&mut inner.rooms, room_id, id);
    }

    /// Remove the connection entirely, vacating every room it occupied.
    /// Returns the rooms it was removed from; calling again (or for an
    /// unknown id) returns an empty list, so teardown is safe to repeat.
    pub fn unregister(&self, id: ConnectionId) -> Vec<String> {
        let mut inner = self.inner.write().unwrap();
        let Some(entry) = inner.connections.remove(&id) else {
            return Vec::new();
        };
        let vacated: Vec<String> = entry.rooms.into_iter().collect();
        for room_id in &vacated {
            remove_member(&mut inner.rooms, room_id, id);
        }
        vacated
    }

    /// Connections currently joined to a room.
    pub fn members_of(&self, room_id: &str) -> Vec<ConnectionId> {
        let inner = self.inner.read().unwrap();
        inner
            .rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Consistent snapshot of (connection, sender) pairs for a room, taken
    /// under the registry lock. Delivery happens outside the lock.
    pub(crate) fn room_senders(&self, room_id: &str) -> Vec<(ConnectionId, ConnectionSender)> {
        let inner = self.inner.read().unwrap();
        let Some(members) = inner.rooms.get(room_id) else {
            return Vec::new();
        };
        members
            .iter()
            .filter_map(|id| {
                inner
                    .connections
                    .get(id)
                    .map(|entry| (*id, entry.sender.clone()))
            })
            .collect()
    }

    /// Display name of the user behind a connection, if still registered.
    pub fn user_of(&self, id: ConnectionId) -> Option<UserIdentity> {
        let inner = self.inner.read().unwrap();
        inner.connections.get(&id).map(|entry| entry.user.clone())
    }

    /// (occupied rooms, total occupants) for the health endpoint.
    pub fn stats(&self) -> (usize, usize) {
        let inner = self.inner.read().unwrap();
        let occupants = inner.rooms.values().map(HashSet::len).sum();
        (inner.rooms.len(), occupants)
    }
}

fn remove_member(rooms: &mut HashMap<String, HashSet<ConnectionId>>, room_id: &str, id: ConnectionId) {
    if let Some(members) = rooms.get_mut(room_id) {
        members.remove(&id);
        if members.is_empty() {
            rooms.remove(room_id);
        }
    }
}
