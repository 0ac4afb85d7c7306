//! Person query functions.
//!
//! Emails are normalized before every lookup and insert. The `UNIQUE
//! COLLATE NOCASE` constraint on `person.email` is what decides a race
//! between two creators of the same identity; no query here checks for
//! existence before inserting.

use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};
use sealpost_types::{normalize_email, KeyCandidate, KeyId, Person, PersonId};

use crate::queries::public_keys;
use crate::{DbError, Result};

const COLUMNS: &str = "id, email, date_added, verified, date_verified, enabled";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        email: row.get(1)?,
        added_at: row.get::<_, i64>(2)? as u64,
        verified: row.get(3)?,
        verified_at: row.get::<_, Option<i64>>(4)?.map(|t| t as u64),
        enabled: row.get(5)?,
    })
}

/// Insert a new person. Fails with [`DbError::Duplicate`] if the email is
/// already registered in any letter case.
pub fn insert(conn: &Connection, email: &str, added_at: u64) -> Result<PersonId> {
    conn.execute(
        "INSERT INTO person (email, date_added) VALUES (?1, ?2)",
        rusqlite::params![normalize_email(email), added_at as i64],
    )
    .map_err(|e| DbError::from_write(e, "identity"))?;
    Ok(conn.last_insert_rowid())
}

/// Create a person and attach every candidate key in one transaction.
///
/// Either the person and all keys are written or nothing is.
pub fn insert_with_keys(
    conn: &mut Connection,
    email: &str,
    keys: &[KeyCandidate],
    added_at: u64,
) -> Result<(PersonId, Vec<KeyId>)> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let person_id = insert(&tx, email, added_at)?;
    let mut key_ids = Vec::with_capacity(keys.len());
    for key in keys {
        let id = public_keys::insert(
            &tx,
            person_id,
            &key.armored,
            None,
            Some(&key.source),
            added_at,
        )?;
        key_ids.push(id);
    }
    tx.commit()?;
    Ok((person_id, key_ids))
}

/// Look up a person by id.
pub fn get(conn: &Connection, id: PersonId) -> Result<Option<Person>> {
    let person = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM person WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    Ok(person)
}

/// Look up a person by email, ignoring case.
pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<Person>> {
    let person = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM person WHERE email = ?1"),
            [normalize_email(email)],
            from_row,
        )
        .optional()?;
    Ok(person)
}

/// Update email, verification and enablement.
///
/// `date_verified` is stamped the first time `verified` is stored as true
/// and is left alone afterwards.
pub fn update(
    conn: &Connection,
    id: PersonId,
    email: &str,
    verified: bool,
    enabled: bool,
    now: u64,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE person SET
                email = ?1,
                verified = ?2,
                date_verified = CASE
                    WHEN ?2 AND date_verified IS NULL THEN ?3
                    WHEN NOT ?2 THEN NULL
                    ELSE date_verified
                END,
                enabled = ?4
             WHERE id = ?5",
            rusqlite::params![normalize_email(email), verified, now as i64, enabled, id],
        )
        .map_err(|e| DbError::from_write(e, "identity"))?;
    if changed == 0 {
        return Err(DbError::NotFound("person".into()));
    }
    Ok(())
}

/// Remove a person. Fails with a constraint error while keys, sessions or
/// messages still reference it.
pub fn delete(conn: &Connection, id: PersonId) -> Result<()> {
    conn.execute("DELETE FROM person WHERE id = ?1", [id])
        .map_err(|e| DbError::from_write(e, "person"))?;
    Ok(())
}
