use serde::{Deserialize, Serialize};

/// An authenticated user, as resolved from a credential by the external
/// token validator. Accounts live outside the chat server; this is the only
/// reference the core holds, and it is immutable for the life of a
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: u64,
    pub display_name: String,
}
