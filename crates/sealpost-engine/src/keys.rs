//! Key upload and management of one's own keys.

use sealpost_crypto::armor;
use sealpost_db::queries::{people, public_keys};
use sealpost_db::DbError;
use sealpost_types::{is_possible_email, normalize_email, unix_now, KeyId, Person, PublicKey};

use crate::auth::{authorize_on, Credentials};
use crate::error::{EngineError, Result};
use crate::sessions::CreatedSession;
use crate::Engine;

/// Where an uploaded key comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeySource {
    /// Pasted or uploaded armor, with the uploaded file's name if any.
    Text {
        armored: String,
        filename: Option<String>,
    },
    /// A URL serving the armored key.
    Url(String),
}

/// Result of [`Engine::upload_key`].
#[derive(Clone, Debug)]
pub struct KeyUpload {
    pub person: Person,
    /// The stored key, new or already present.
    pub key: Option<PublicKey>,
    /// False when the identical key was already attached.
    pub added: bool,
    /// Present when a session was requested along with the upload.
    pub session: Option<CreatedSession>,
}

impl Engine {
    /// Attach a public key to `email`, registering the person on first use.
    ///
    /// With `request_session`, a session is then created for every key of
    /// the person (the new one included) and mailed to them.
    pub async fn upload_key(
        &self,
        email: &str,
        source: KeySource,
        request_session: bool,
    ) -> Result<KeyUpload> {
        let email = normalize_email(email);
        if !is_possible_email(&email) {
            return Err(EngineError::InvalidEmail);
        }

        let (armored, nickname) = match source {
            KeySource::Text { armored, filename } => (armored, filename),
            KeySource::Url(url) => {
                let armored = self.caps.fetcher.fetch(&url).await.map_err(|e| {
                    tracing::warn!(url = %url, error = %e, "Key fetch failed");
                    EngineError::InvalidKeyFormat(format!("could not fetch key: {e}"))
                })?;
                (armored, Some(url))
            }
        };
        let armored = armored.trim().to_string();
        armor::validate_public_key(&armored)?;

        let (person, key, added, keys) = {
            let conn = self.db.connect()?;
            let now = unix_now();

            let person = match people::find_by_email(&conn, &email)? {
                Some(person) => person,
                None => match people::insert(&conn, &email, now) {
                    Ok(id) => people::get(&conn, id)?.ok_or(EngineError::NotFound("person"))?,
                    Err(DbError::Duplicate(_)) => people::find_by_email(&conn, &email)?
                        .ok_or(EngineError::NotFound("person"))?,
                    Err(e) => return Err(e.into()),
                },
            };
            if !person.enabled {
                return Err(EngineError::Disabled);
            }

            let added = if public_keys::exists_for_person(&conn, person.id, &armored)? {
                false
            } else {
                match public_keys::insert(
                    &conn,
                    person.id,
                    &armored,
                    nickname.as_deref(),
                    Some(self.config.key_source.as_str()),
                    now,
                ) {
                    Ok(_) => true,
                    Err(DbError::Duplicate(_)) => false,
                    Err(e) => return Err(e.into()),
                }
            };

            let keys = public_keys::list_for_person(&conn, person.id)?;
            let key = keys.iter().find(|k| k.armored == armored).cloned();
            (person, key, added, keys)
        };

        if added {
            tracing::info!(person_id = person.id, email = %person.email, "Public key added");
        } else {
            tracing::debug!(person_id = person.id, "Public key already attached");
        }

        let session = if request_session {
            let created = self.create_session(&person, &keys).await?;
            self.deliver_session(&person, &created).await?;
            Some(created)
        } else {
            None
        };

        Ok(KeyUpload {
            person,
            key,
            added,
            session,
        })
    }

    /// The caller's own stored keys.
    pub fn person_keys(&self, creds: Credentials) -> Result<Vec<PublicKey>> {
        let conn = self.db.connect()?;
        let person = authorize_on(&conn, creds, unix_now())?.person;
        Ok(public_keys::list_for_person(&conn, person.id)?)
    }

    /// Delete one of the caller's keys.
    pub fn remove_key(&self, creds: Credentials, key_id: KeyId) -> Result<()> {
        let conn = self.db.connect()?;
        let person = authorize_on(&conn, creds, unix_now())?.person;
        match public_keys::get(&conn, key_id)? {
            Some(key) if key.person_id == person.id => {
                public_keys::delete(&conn, key_id)?;
                tracing::info!(person_id = person.id, key_id, "Public key removed");
                Ok(())
            }
            _ => Err(EngineError::NotFound("public key")),
        }
    }
}
