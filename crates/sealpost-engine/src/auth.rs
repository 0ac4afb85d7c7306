//! Credential checks for operations bound to a confirmed session.

use rusqlite::Connection;
use sealpost_db::queries::{people, sessions};
use sealpost_types::{unix_now, Person, PersonId, Session, SessionId};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::sessions::sweep_expired_sessions;
use crate::Engine;

/// The session/person pair a client presents with each request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub session_id: SessionId,
    pub person_id: PersonId,
}

/// A request whose credentials checked out.
#[derive(Clone, Debug)]
pub struct Authorized {
    pub session: Session,
    pub person: Person,
}

/// Resolve credentials on an open connection.
///
/// The session must be live and confirmed, its person must exist, be
/// enabled, and be the person the client claims to be.
pub(crate) fn authorize_on(conn: &Connection, creds: Credentials, now: u64) -> Result<Authorized> {
    sweep_expired_sessions(conn, now);

    let session = sessions::get(conn, creds.session_id)?.ok_or(EngineError::InvalidSession)?;
    if !session.verified {
        return Err(EngineError::InvalidSession);
    }
    let person = people::get(conn, session.person_id)?.ok_or(EngineError::InvalidSession)?;
    if !person.enabled {
        return Err(EngineError::Disabled);
    }
    if person.id != creds.person_id {
        tracing::warn!(
            session_id = session.id,
            claimed = creds.person_id,
            "Session presented for another person"
        );
        return Err(EngineError::InvalidSession);
    }
    Ok(Authorized { session, person })
}

impl Engine {
    /// Check credentials.
    pub fn authorize(&self, creds: Credentials) -> Result<Authorized> {
        let conn = self.db.connect()?;
        authorize_on(&conn, creds, unix_now())
    }
}
