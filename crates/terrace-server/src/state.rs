use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::auth::{HmacTokenValidator, TokenValidator};
use crate::broadcaster::RoomBroadcaster;
use crate::config::ServerConfig;
use crate::membership::{CommunityDirectory, MembershipGate};
use crate::message_log::MessageLog;
use crate::registry::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub broadcaster: RoomBroadcaster,
    pub log: Arc<MessageLog>,
    pub tokens: Arc<dyn TokenValidator>,
    pub gate: MembershipGate,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let broadcaster = RoomBroadcaster::new(Arc::clone(&registry));
        let log = Arc::new(MessageLog::with_capacity(config.limits.max_stored_messages));
        let tokens: Arc<dyn TokenValidator> =
            Arc::new(HmacTokenValidator::new(config.auth.token_secret.clone()));
        let directory = Arc::new(CommunityDirectory::from_config(&config.communities));
        let gate = MembershipGate::new(directory);
        Self {
            registry,
            broadcaster,
            log,
            tokens,
            gate,
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            config: Arc::new(config),
        }
    }
}

/// RAII guard for the live websocket connection count; decrements on drop so
/// every exit path releases its slot.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}
