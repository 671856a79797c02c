//! Anonymous user identifiers for sessions started without a caller-supplied user.

use uuid::Uuid;

const ANONYMOUS_PREFIX: &str = "anon_";

/// A fresh `anon_` id carrying 122 random bits (UUID v4, simple form).
pub fn anonymous_user_id() -> String {
    format!("{}{}", ANONYMOUS_PREFIX, Uuid::new_v4().simple())
}

/// The caller's user id, or a new anonymous one when it is absent or empty.
pub fn resolve_user(user: Option<&str>) -> String {
    match user {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => anonymous_user_id(),
    }
}
