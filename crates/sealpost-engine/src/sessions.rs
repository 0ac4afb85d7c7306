//! Session lifecycle: `Created -> Confirmed`, expiry by sweep.
//!
//! Expired sessions are never filtered at read time. They are deleted by a
//! sweep that runs at the start of every operation touching sessions, so a
//! lookup that follows a sweep only ever sees live rows.

use rusqlite::{Connection, TransactionBehavior};
use sealpost_db::queries::{people, public_keys, sessions};
use sealpost_db::DbError;
use sealpost_types::{
    is_possible_email, normalize_email, unix_now, Person, PersonId, PublicKey, Session,
};

use crate::delivery::{Attachment, OutgoingMail};
use crate::error::{EngineError, Result};
use crate::Engine;

/// Subject line of session mails.
pub const SESSION_SUBJECT: &str = "Your session code";

const ENVELOPE_CONTENT_TYPE: &str = "application/pgp-encrypted";

/// Attempts at finding an unused code before giving up.
const CODE_ATTEMPTS: usize = 3;

/// A stored session and the envelope carrying its code.
#[derive(Clone, Debug)]
pub struct CreatedSession {
    pub session: Session,
    /// Armored ciphertext of the code, addressed to every key at once.
    pub envelope: String,
}

/// Outcome of a successful confirmation.
#[derive(Clone, Debug)]
pub struct Confirmation {
    pub session: Session,
    pub person: Person,
}

/// Delete expired sessions. Failures are logged and left for the next
/// caller; they never fail the triggering request.
pub(crate) fn sweep_expired_sessions(conn: &Connection, now: u64) {
    match sessions::sweep_expired(conn, now) {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "Swept expired sessions"),
        Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
    }
}

impl Engine {
    /// Store a new session for `person` and encrypt its code to all of
    /// `keys` in one envelope.
    ///
    /// The row is kept even if encryption fails afterwards; it expires on
    /// its own.
    pub async fn create_session(&self, person: &Person, keys: &[PublicKey]) -> Result<CreatedSession> {
        if keys.is_empty() {
            return Err(EngineError::NoRecipientKeys);
        }
        if !person.enabled {
            return Err(EngineError::Disabled);
        }

        let session = {
            let conn = self.db.connect()?;
            let now = unix_now();
            sweep_expired_sessions(&conn, now);
            self.insert_session(&conn, person, now)?
        };

        let recipients: Vec<String> = keys.iter().map(|k| k.armored.clone()).collect();
        let envelope = self.caps.encryptor.encrypt(&session.code, &recipients).await?;

        tracing::info!(
            person_id = person.id,
            session_id = session.id,
            keys = keys.len(),
            "Session created"
        );
        Ok(CreatedSession { session, envelope })
    }

    /// Insert with a fresh code, retrying while the code is taken.
    fn insert_session(&self, conn: &Connection, person: &Person, now: u64) -> Result<Session> {
        let expires_at = now + self.config.session_duration_secs;
        for _ in 0..CODE_ATTEMPTS {
            let code = self.words.generate_code(self.config.session_words);
            match sessions::insert(conn, person.id, &code, now, expires_at) {
                Ok(id) => {
                    return Ok(Session {
                        id,
                        person_id: person.id,
                        code,
                        created_at: now,
                        verified: false,
                        verified_at: None,
                        expires_at,
                    })
                }
                Err(e) if e.is_duplicate() => {
                    tracing::debug!(person_id = person.id, "Session code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::Transport("could not allocate a unique session code".into()))
    }

    /// Look up the person behind `email`, create a session and mail them
    /// the envelope.
    ///
    /// A delivery failure is reported, but the session stays stored.
    pub async fn request_session(&self, email: &str) -> Result<CreatedSession> {
        let email = normalize_email(email);
        if !is_possible_email(&email) {
            return Err(EngineError::InvalidEmail);
        }

        let (person, keys) = {
            let conn = self.db.connect()?;
            let person = people::find_by_email(&conn, &email)?
                .ok_or(EngineError::NotFound("person"))?;
            if !person.enabled {
                return Err(EngineError::Disabled);
            }
            let keys = public_keys::list_for_person(&conn, person.id)?;
            (person, keys)
        };

        let created = self.create_session(&person, &keys).await?;
        self.deliver_session(&person, &created).await?;
        Ok(created)
    }

    /// Mail a session envelope to its owner.
    pub(crate) async fn deliver_session(&self, person: &Person, created: &CreatedSession) -> Result<()> {
        let mut body = String::from(
            "Here is your session information.\n\
             Decrypt the attached file with your private key, and use it at the session form.\n",
        );
        if !self.config.server_link.is_empty() {
            body.push_str(&format!("\n{}/confirm\n", self.config.server_link));
        }

        let mail = OutgoingMail {
            to: person.email.clone(),
            subject: SESSION_SUBJECT.to_string(),
            body,
            attachments: vec![Attachment {
                filename: format!("session-{}.asc", created.session.created_at),
                content_type: ENVELOPE_CONTENT_TYPE.to_string(),
                contents: created.envelope.clone(),
            }],
        };
        self.caps.mailer.send(&mail).await?;
        tracing::info!(person_id = person.id, session_id = created.session.id, "Session mailed");
        Ok(())
    }

    /// Confirm a decrypted code.
    ///
    /// Sweeps first, so an expired code is indistinguishable from an
    /// unknown one. Confirming twice is not an error. The owning person is
    /// marked verified on first confirmation.
    ///
    /// The owner is checked before anything is written: a rejected
    /// confirmation leaves both the session and the person untouched.
    pub fn confirm_session(&self, code: &str) -> Result<Confirmation> {
        let mut conn = self.db.connect()?;
        let now = unix_now();
        sweep_expired_sessions(&conn, now);

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let session = sessions::find_by_code(&tx, code.trim())?.ok_or(EngineError::InvalidSession)?;
        let person = people::get(&tx, session.person_id)?.ok_or(EngineError::InvalidSession)?;
        if !person.enabled {
            tracing::info!(person_id = person.id, "Confirmation refused for disabled person");
            return Err(EngineError::Disabled);
        }

        if !session.verified {
            sessions::mark_verified(&tx, session.id, now)?;
        }
        if !person.verified {
            people::update(&tx, person.id, &person.email, true, person.enabled, now)?;
            tracing::info!(person_id = person.id, "Identity verified");
        }
        let session = sessions::get(&tx, session.id)?.ok_or(EngineError::InvalidSession)?;
        let person = people::get(&tx, person.id)?.ok_or(EngineError::InvalidSession)?;
        tx.commit().map_err(DbError::from)?;

        tracing::info!(person_id = person.id, session_id = session.id, "Session confirmed");
        Ok(Confirmation { session, person })
    }

    /// All live sessions of a person.
    pub fn sessions_for_person(&self, person_id: PersonId) -> Result<Vec<Session>> {
        let conn = self.db.connect()?;
        sweep_expired_sessions(&conn, unix_now());
        Ok(sessions::list_for_person(&conn, person_id)?)
    }

    /// Run the session sweep on its own.
    pub fn sweep_sessions(&self) -> Result<usize> {
        let conn = self.db.connect()?;
        Ok(sessions::sweep_expired(&conn, unix_now())?)
    }
}
