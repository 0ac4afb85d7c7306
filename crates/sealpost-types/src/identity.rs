//! Identity structures: people and their public keys.

use serde::{Deserialize, Serialize};

use crate::{KeyId, PersonId};

/// A registered email identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    /// Always stored lower-cased.
    pub email: String,
    #[serde(rename = "date_joined")]
    pub added_at: u64,
    /// Set only by a successfully confirmed session.
    pub verified: bool,
    #[serde(rename = "date_verified", skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<u64>,
    /// Disabled people cannot authenticate or receive sessions.
    pub enabled: bool,
}

/// An ASCII-armored OpenPGP public key owned by exactly one person.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub id: KeyId,
    pub person_id: PersonId,
    #[serde(rename = "key")]
    pub armored: String,
    #[serde(rename = "name", skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "date_added")]
    pub added_at: u64,
}

/// A key found in an external directory and not (yet) stored locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCandidate {
    #[serde(rename = "key")]
    pub armored: String,
    pub source: String,
}
