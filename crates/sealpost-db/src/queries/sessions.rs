//! Session query functions.
//!
//! There is no stored "expired" state: a row whose `date_expires` is at or
//! before now is dead, and [`sweep_expired`] removes it. Callers sweep
//! before every lookup they intend to trust.

use rusqlite::{Connection, OptionalExtension, Row};
use sealpost_types::{PersonId, Session, SessionId};

use crate::{DbError, Result};

const COLUMNS: &str =
    "id, person_id, session_code, date_created, verified, date_verified, date_expires";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        person_id: row.get(1)?,
        code: row.get(2)?,
        created_at: row.get::<_, i64>(3)? as u64,
        verified: row.get(4)?,
        verified_at: row.get::<_, Option<i64>>(5)?.map(|t| t as u64),
        expires_at: row.get::<_, i64>(6)? as u64,
    })
}

/// Store a new session. A code that was ever issued before, even to a
/// session swept since, fails with [`DbError::Duplicate`].
///
/// The code is recorded as issued first. If the session row then fails to
/// insert, the code stays burned.
pub fn insert(
    conn: &Connection,
    person_id: PersonId,
    code: &str,
    created_at: u64,
    expires_at: u64,
) -> Result<SessionId> {
    conn.execute(
        "INSERT INTO issued_code (code, person_id, date_issued) VALUES (?1, ?2, ?3)",
        rusqlite::params![code, person_id, created_at as i64],
    )
    .map_err(|e| DbError::from_write(e, "session code"))?;
    conn.execute(
        "INSERT INTO session (person_id, session_code, date_created, date_expires)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![person_id, code, created_at as i64, expires_at as i64],
    )
    .map_err(|e| DbError::from_write(e, "session code"))?;
    Ok(conn.last_insert_rowid())
}

/// Look up a session by its plaintext code.
pub fn find_by_code(conn: &Connection, code: &str) -> Result<Option<Session>> {
    let session = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM session WHERE session_code = ?1"),
            [code],
            from_row,
        )
        .optional()?;
    Ok(session)
}

/// Look up a session by id.
pub fn get(conn: &Connection, id: SessionId) -> Result<Option<Session>> {
    let session = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM session WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    Ok(session)
}

/// All sessions held by a person, oldest first.
pub fn list_for_person(conn: &Connection, person_id: PersonId) -> Result<Vec<Session>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM session WHERE person_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([person_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Flip a session to verified.
///
/// Idempotent: concurrent or repeated calls all succeed, the flag ends up
/// true and the first verification timestamp is kept.
pub fn mark_verified(conn: &Connection, id: SessionId, now: u64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE session
         SET verified = 1, date_verified = COALESCE(date_verified, ?2)
         WHERE id = ?1",
        rusqlite::params![id, now as i64],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("session".into()));
    }
    Ok(())
}

/// Remove one session.
pub fn delete(conn: &Connection, id: SessionId) -> Result<()> {
    conn.execute("DELETE FROM session WHERE id = ?1", [id])?;
    Ok(())
}

/// Delete every session expiring at or before `now`. Returns the count.
pub fn sweep_expired(conn: &Connection, now: u64) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM session WHERE date_expires <= ?1",
        [now as i64],
    )?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::people;

    fn test_db() -> (Connection, PersonId) {
        let conn = crate::open_memory().expect("open test db");
        let person = people::insert(&conn, "alice@example.org", 1).expect("person");
        (conn, person)
    }

    #[test]
    fn test_insert_and_find_by_code() {
        let (conn, person) = test_db();
        let id = insert(&conn, person, "apple banana cherry", 100, 1900).expect("insert");

        let session = find_by_code(&conn, "apple banana cherry")
            .expect("find")
            .expect("present");
        assert_eq!(session.id, id);
        assert_eq!(session.person_id, person);
        assert_eq!(session.expires_at, 1900);
        assert!(!session.verified);

        assert!(find_by_code(&conn, "apple banana").expect("find").is_none());
    }

    #[test]
    fn test_code_unique() {
        let (conn, person) = test_db();
        insert(&conn, person, "same code", 1, 10).expect("first");
        let err = insert(&conn, person, "same code", 2, 10).expect_err("second");
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_swept_code_never_issued_again() {
        let (conn, alice) = test_db();
        let bob = people::insert(&conn, "bob@example.org", 1).expect("bob");
        insert(&conn, alice, "amber birch cedar", 1, 10).expect("first");
        assert_eq!(sweep_expired(&conn, 10).expect("sweep"), 1);

        let err = insert(&conn, bob, "amber birch cedar", 20, 100).expect_err("reissue");
        assert!(err.is_duplicate());
        assert!(list_for_person(&conn, bob).expect("list").is_empty());
    }

    #[test]
    fn test_mark_verified_idempotent() {
        let (conn, person) = test_db();
        let id = insert(&conn, person, "code", 1, 100).expect("insert");

        mark_verified(&conn, id, 10).expect("first");
        mark_verified(&conn, id, 20).expect("second");

        let session = get(&conn, id).expect("get").expect("present");
        assert!(session.verified);
        assert_eq!(session.verified_at, Some(10));
    }

    #[test]
    fn test_mark_verified_missing() {
        let (conn, _) = test_db();
        assert!(matches!(mark_verified(&conn, 77, 1), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_sweep_expired() {
        let (conn, person) = test_db();
        insert(&conn, person, "past", 1, 50).expect("past");
        insert(&conn, person, "boundary", 1, 100).expect("boundary");
        let live = insert(&conn, person, "future", 1, 101).expect("future");

        assert_eq!(sweep_expired(&conn, 100).expect("sweep"), 2);
        assert_eq!(sweep_expired(&conn, 100).expect("resweep"), 0);

        let remaining = list_for_person(&conn, person).expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, live);
    }

    #[test]
    fn test_delete() {
        let (conn, person) = test_db();
        let id = insert(&conn, person, "code", 1, 100).expect("insert");
        delete(&conn, id).expect("delete");
        assert!(get(&conn, id).expect("get").is_none());
    }
}
