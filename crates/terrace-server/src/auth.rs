use hmac::{Hmac, Mac};
use sha2::Sha256;

use terrace_core::user::UserIdentity;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted display name length.
const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Resolves a client credential to a user identity.
///
/// Token issuance belongs to the external account service; the chat server
/// only validates what it is handed.
pub trait TokenValidator: Send + Sync {
    /// Returns the identity the credential proves, or None if it is invalid.
    fn resolve(&self, credential: &str) -> Option<UserIdentity>;
}

/// Validates `"<user_id>:<display_name>:<hex signature>"` credentials, where
/// the signature is HMAC-SHA256 over `"<user_id>:<display_name>"` with the
/// configured secret. With no secret configured, unsigned
/// `"<user_id>:<display_name>"` credentials are accepted (development mode).
pub struct HmacTokenValidator {
    secret: Option<String>,
}

impl HmacTokenValidator {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    fn verify_signature(payload: &str, hex_sig: &str, secret: &str) -> bool {
        let Ok(expected) = hex::decode(hex_sig) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(payload.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

fn valid_display_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_DISPLAY_NAME_LEN && !name.chars().any(char::is_control)
}

impl TokenValidator for HmacTokenValidator {
    fn resolve(&self, credential: &str) -> Option<UserIdentity> {
        let mut parts = credential.splitn(3, ':');
        let id: u64 = parts.next()?.parse().ok()?;
        let display_name = parts.next()?;
        if !valid_display_name(display_name) {
            return None;
        }

        if let Some(ref secret) = self.secret {
            let signature = parts.next()?;
            let payload = format!("{id}:{display_name}");
            if !Self::verify_signature(&payload, signature, secret) {
                return None;
            }
        }

        Some(UserIdentity {
            id,
            display_name: display_name.to_string(),
        })
    }
}
