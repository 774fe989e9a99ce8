/// Maximum length of a community room id.
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Validate a community room id. Room ids are stable slugs assigned by the
/// membership authority: non-empty, at most [`MAX_ROOM_ID_LEN`] bytes, ASCII
/// alphanumerics plus `-` and `_`.
pub fn is_valid_room_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ROOM_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
