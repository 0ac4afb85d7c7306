//! # sealpost-types
//!
//! Shared domain types used across the Sealpost workspace.
//!
//! Every persisted entity (Person, PublicKey, Session, Message) is a plain
//! serde struct; the derived `MessageDigest` is rebuilt on each read and
//! never stored.

pub mod identity;
pub mod message;
pub mod session;

pub use identity::{KeyCandidate, Person, PublicKey};
pub use message::{Message, MessageDigest};
pub use session::Session;

/// Common id aliases. All ids are SQLite rowids.
pub type PersonId = i64;
pub type KeyId = i64;
pub type SessionId = i64;
pub type MessageId = i64;

/// Number of dictionary words in a generated session code.
pub const SESSION_WORDS: usize = 6;

/// Session lifetime in seconds (30 minutes).
pub const SESSION_DURATION_SECS: u64 = 30 * 60;

/// Message lifetime in seconds (30 days).
pub const MESSAGE_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Digests shown per page of the board.
pub const POSTS_PER_PAGE: u32 = 20;

/// Maximum characters in a message preview.
pub const PREVIEW_LENGTH: usize = 34;

/// Preview shown when no body line qualifies.
pub const NO_PREVIEW: &str = "[no preview available]";

/// Source tag for keys uploaded directly to this board.
pub const KEY_SOURCE: &str = "sealpost";

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Canonical form of an email address: trimmed and lower-cased.
///
/// Every lookup and insert keyed by email goes through this function so
/// that two addresses differing only by case resolve to one identity.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose plausibility check: something, an `@`, something, a dot, something.
pub fn is_possible_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    match domain.rfind('.') {
        Some(dot) => dot > 0 && dot + 1 < domain.len(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.ORG "), "alice@example.org");
        assert_eq!(normalize_email("bob@example.org"), "bob@example.org");
    }

    #[test]
    fn test_is_possible_email() {
        assert!(is_possible_email("alice@example.org"));
        assert!(is_possible_email("a.b+c@mail.example.co"));
        assert!(!is_possible_email("alice"));
        assert!(!is_possible_email("@example.org"));
        assert!(!is_possible_email("alice@example"));
        assert!(!is_possible_email("alice@example."));
        assert!(!is_possible_email("alice@.org"));
    }

    #[test]
    fn test_durations() {
        assert_eq!(SESSION_DURATION_SECS, 1800);
        assert_eq!(MESSAGE_DURATION_SECS, 2_592_000);
    }
}
