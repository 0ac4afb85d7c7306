//! Key search: local store first, external directory second.

use sealpost_db::queries::{people, public_keys};
use sealpost_types::{is_possible_email, normalize_email, unix_now, KeyCandidate, Person, PublicKey};

use crate::auth::{authorize_on, Credentials};
use crate::error::{EngineError, Result};
use crate::provision::ProvisionRequest;
use crate::Engine;

/// Where the keys for an email were found.
#[derive(Clone, Debug)]
pub enum KeySearch {
    /// Registered here. Stored keys are returned verbatim.
    Local { person: Person, keys: Vec<PublicKey> },
    /// Unknown here, found in the directory. A background request to
    /// register the person has been queued.
    Directory(Vec<KeyCandidate>),
    Unknown,
}

impl KeySearch {
    /// The armored keys, whichever way they were found.
    pub fn armored(&self) -> Vec<&str> {
        match self {
            KeySearch::Local { keys, .. } => keys.iter().map(|k| k.armored.as_str()).collect(),
            KeySearch::Directory(found) => found.iter().map(|k| k.armored.as_str()).collect(),
            KeySearch::Unknown => Vec::new(),
        }
    }
}

impl Engine {
    /// Find the public keys of `email` on behalf of a signed-in person.
    ///
    /// Directory hits are returned without waiting for the person to be
    /// stored. If two searches race on the same unknown email, both return
    /// the directory keys and the loser's provisioning is dropped.
    pub async fn search_keys(&self, creds: Credentials, email: &str) -> Result<KeySearch> {
        let email = normalize_email(email);

        let local = {
            let conn = self.db.connect()?;
            authorize_on(&conn, creds, unix_now())?;
            if !is_possible_email(&email) {
                return Err(EngineError::InvalidEmail);
            }
            match people::find_by_email(&conn, &email)? {
                Some(person) => {
                    let keys = public_keys::list_for_person(&conn, person.id)?;
                    Some((person, keys))
                }
                None => None,
            }
        };
        if let Some((person, keys)) = local {
            return Ok(KeySearch::Local { person, keys });
        }

        let found = self.caps.directory.search(&email).await?;
        if found.is_empty() {
            tracing::debug!(email = %email, "No keys found for email");
            return Ok(KeySearch::Unknown);
        }

        tracing::info!(email = %email, keys = found.len(), "Keys found in directory");
        let request = ProvisionRequest {
            email,
            keys: found.clone(),
        };
        self.provisioner.enqueue(request).await;
        Ok(KeySearch::Directory(found))
    }
}
