use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use terrace_core::net::messages::ErrorReason;
use terrace_core::user::UserIdentity;

use crate::config::CommunityConfig;

/// External authority over which users may participate in which communities.
/// Community CRUD and durable membership live behind this seam.
pub trait MembershipAuthority: Send + Sync {
    fn room_exists(&self, room_id: &str) -> bool;
    fn is_member(&self, user_id: u64, room_id: &str) -> bool;
}

/// Why a join was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDenied {
    RoomNotFound,
    NotAMember,
}

impl JoinDenied {
    pub fn reason(self) -> ErrorReason {
        match self {
            Self::RoomNotFound => ErrorReason::RoomNotFound,
            Self::NotAMember => ErrorReason::NotAMember,
        }
    }
}

struct CommunityEntry {
    open: bool,
    members: HashSet<u64>,
}

/// In-memory membership directory seeded from configuration. Open
/// communities admit any authenticated user; closed ones admit only the
/// listed members.
pub struct CommunityDirectory {
    communities: HashMap<String, CommunityEntry>,
}

impl CommunityDirectory {
    pub fn from_config(communities: &[CommunityConfig]) -> Self {
        let communities = communities
            .iter()
            .map(|c| {
                (
                    c.id.clone(),
                    CommunityEntry {
                        open: c.open,
                        members: c.members.iter().copied().collect(),
                    },
                )
            })
            .collect();
        Self { communities }
    }
}

impl MembershipAuthority for CommunityDirectory {
    fn room_exists(&self, room_id: &str) -> bool {
        self.communities.contains_key(room_id)
    }

    fn is_member(&self, user_id: u64, room_id: &str) -> bool {
        self.communities
            .get(room_id)
            .is_some_and(|c| c.open || c.members.contains(&user_id))
    }
}

/// Authorizes joins against the membership authority. Consulted before every
/// join; a denial is reported per-attempt and leaves the connection usable.
#[derive(Clone)]
pub struct MembershipGate {
    authority: Arc<dyn MembershipAuthority>,
}

impl MembershipGate {
    pub fn new(authority: Arc<dyn MembershipAuthority>) -> Self {
        Self { authority }
    }

    pub fn authorize(&self, user: &UserIdentity, room_id: &str) -> Result<(), JoinDenied> {
        if !self.authority.room_exists(room_id) {
            return Err(JoinDenied::RoomNotFound);
        }
        if !self.authority.is_member(user.id, room_id) {
            return Err(JoinDenied::NotAMember);
        }
        Ok(())
    }
}
