//! Authentication sessions.

use serde::{Deserialize, Serialize};

use crate::{PersonId, SessionId};

/// One authentication attempt for a person.
///
/// The plaintext `code` is kept only for comparison on confirmation and is
/// never serialized; the user receives it solely as ciphertext.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub person_id: PersonId,
    #[serde(skip_serializing, default)]
    pub code: String,
    #[serde(rename = "date_created")]
    pub created_at: u64,
    pub verified: bool,
    #[serde(rename = "date_verified", skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<u64>,
    #[serde(rename = "date_expires")]
    pub expires_at: u64,
}

impl Session {
    /// A session is logically dead once its expiry is at or before `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }
}
