//! Message and recipient query functions.
//!
//! A message row never outlives its recipient rows: every delete path
//! removes `message_recipient` rows first. The foreign key on
//! `message_recipient.message_id` has no cascade, so getting the order
//! wrong is an error rather than a silent orphan.

use rusqlite::{Connection, OptionalExtension, Row};
use sealpost_types::{Message, MessageId, PersonId};

use crate::{DbError, Result};

const COLUMNS: &str = "m.id, m.person_id, m.message, m.date_posted, m.date_expires";

/// Ordering shared by every multi-row retrieval. Ties on the posting time
/// fall back to insertion order so pages never overlap.
const LATEST_FIRST: &str = "ORDER BY m.date_posted DESC, m.id ASC";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        author_id: row.get(1)?,
        body: row.get(2)?,
        posted_at: row.get::<_, i64>(3)? as u64,
        expires_at: row.get::<_, i64>(4)? as u64,
    })
}

/// Which messages [`retrieve`] returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageFilter {
    /// Messages written by the person.
    ByAuthor(PersonId),
    /// Messages addressed to the person.
    ByRecipient(PersonId),
    /// Every live message.
    LatestGlobal,
    /// Messages the person wrote or received.
    LatestInvolving(PersonId),
}

impl MessageFilter {
    /// WHERE clause with the person bound as `?3`.
    fn clause(self) -> (&'static str, Option<PersonId>) {
        match self {
            MessageFilter::ByAuthor(id) => ("WHERE m.person_id = ?3", Some(id)),
            MessageFilter::ByRecipient(id) => (
                "WHERE EXISTS (SELECT 1 FROM message_recipient r
                               WHERE r.message_id = m.id AND r.person_id = ?3)",
                Some(id),
            ),
            MessageFilter::LatestGlobal => ("", None),
            MessageFilter::LatestInvolving(id) => (
                "WHERE m.person_id = ?3
                    OR EXISTS (SELECT 1 FROM message_recipient r
                               WHERE r.message_id = m.id AND r.person_id = ?3)",
                Some(id),
            ),
        }
    }
}

/// Outcome of [`sweep_expired`].
#[derive(Debug, Default)]
pub struct SweepReport {
    pub removed: usize,
    /// Messages that could not be fully removed. The next sweep picks
    /// them up again.
    pub failures: Vec<(MessageId, DbError)>,
}

/// Store a message body. Returns the new id.
pub fn insert(
    conn: &Connection,
    author_id: PersonId,
    body: &str,
    posted_at: u64,
    expires_at: u64,
) -> Result<MessageId> {
    conn.execute(
        "INSERT INTO message (person_id, message, date_posted, date_expires)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![author_id, body, posted_at as i64, expires_at as i64],
    )
    .map_err(|e| DbError::from_write(e, "message"))?;
    Ok(conn.last_insert_rowid())
}

/// Look up a message by id.
pub fn get(conn: &Connection, id: MessageId) -> Result<Option<Message>> {
    let message = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM message m WHERE m.id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    Ok(message)
}

/// Attach one recipient.
pub fn add_recipient(conn: &Connection, message_id: MessageId, person_id: PersonId) -> Result<()> {
    conn.execute(
        "INSERT INTO message_recipient (message_id, person_id) VALUES (?1, ?2)",
        rusqlite::params![message_id, person_id],
    )
    .map_err(|e| DbError::from_write(e, "recipient"))?;
    Ok(())
}

/// Attach each recipient independently.
///
/// Each insert commits on its own, so a failure for one person (unknown id,
/// repeated id) leaves the message and the other recipients in place. The
/// result list lines up with `people`.
pub fn add_recipients(
    conn: &Connection,
    message_id: MessageId,
    people: &[PersonId],
) -> Vec<Result<()>> {
    people
        .iter()
        .map(|&person_id| add_recipient(conn, message_id, person_id))
        .collect()
}

/// Detach one recipient.
pub fn remove_recipient(
    conn: &Connection,
    message_id: MessageId,
    person_id: PersonId,
) -> Result<()> {
    conn.execute(
        "DELETE FROM message_recipient WHERE message_id = ?1 AND person_id = ?2",
        rusqlite::params![message_id, person_id],
    )?;
    Ok(())
}

/// Recipient ids in the order they were attached.
pub fn recipients(conn: &Connection, message_id: MessageId) -> Result<Vec<PersonId>> {
    let mut stmt = conn.prepare(
        "SELECT person_id FROM message_recipient WHERE message_id = ?1 ORDER BY rowid",
    )?;
    let ids = stmt
        .query_map([message_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Remove a message: recipient rows first, then the message row.
///
/// Not wrapped in a transaction. If the second statement fails the
/// recipients are already gone and a later call finishes the job.
pub fn delete(conn: &Connection, id: MessageId) -> Result<()> {
    conn.execute("DELETE FROM message_recipient WHERE message_id = ?1", [id])?;
    conn.execute("DELETE FROM message WHERE id = ?1", [id])
        .map_err(|e| DbError::from_write(e, "message"))?;
    Ok(())
}

/// Ids of messages expiring at or before `now`.
pub fn expired_ids(conn: &Connection, now: u64) -> Result<Vec<MessageId>> {
    let mut stmt = conn.prepare("SELECT id FROM message WHERE date_expires <= ?1 ORDER BY id")?;
    let ids = stmt
        .query_map([now as i64], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Delete every expired message, one at a time.
///
/// A failure on one message is recorded and the sweep moves on. Safe to
/// run concurrently with another sweep: deletes of rows already gone are
/// no-ops.
pub fn sweep_expired(conn: &Connection, now: u64) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    for id in expired_ids(conn, now)? {
        match delete(conn, id) {
            Ok(()) => report.removed += 1,
            Err(e) => report.failures.push((id, e)),
        }
    }
    Ok(report)
}

/// Page through messages, newest first.
pub fn retrieve(
    conn: &Connection,
    filter: MessageFilter,
    limit: u32,
    offset: u32,
) -> Result<Vec<Message>> {
    let (clause, person) = filter.clause();
    let sql = format!("SELECT {COLUMNS} FROM message m {clause} {LATEST_FIRST} LIMIT ?1 OFFSET ?2");
    let mut stmt = conn.prepare(&sql)?;
    let rows = match person {
        Some(person_id) => stmt
            .query_map(rusqlite::params![limit, offset, person_id], from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt
            .query_map(rusqlite::params![limit, offset], from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}
