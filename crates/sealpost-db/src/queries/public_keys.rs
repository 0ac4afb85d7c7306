//! Public key query functions.

use rusqlite::{Connection, OptionalExtension, Row};
use sealpost_types::{KeyId, PersonId, PublicKey};

use crate::{DbError, Result};

const COLUMNS: &str = "id, person_id, key, nickname, source, date_added";

fn from_row(row: &Row<'_>) -> rusqlite::Result<PublicKey> {
    Ok(PublicKey {
        id: row.get(0)?,
        person_id: row.get(1)?,
        armored: row.get(2)?,
        nickname: row.get(3)?,
        source: row.get(4)?,
        added_at: row.get::<_, i64>(5)? as u64,
    })
}

/// Attach a key to a person. The same armored text cannot be attached
/// twice to one person ([`DbError::Duplicate`]).
pub fn insert(
    conn: &Connection,
    person_id: PersonId,
    armored: &str,
    nickname: Option<&str>,
    source: Option<&str>,
    added_at: u64,
) -> Result<KeyId> {
    conn.execute(
        "INSERT INTO public_key (person_id, key, nickname, source, date_added)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![person_id, armored, nickname, source, added_at as i64],
    )
    .map_err(|e| DbError::from_write(e, "public key"))?;
    Ok(conn.last_insert_rowid())
}

/// Get a key by id.
pub fn get(conn: &Connection, id: KeyId) -> Result<Option<PublicKey>> {
    let key = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM public_key WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    Ok(key)
}

/// All keys of a person, oldest first.
pub fn list_for_person(conn: &Connection, person_id: PersonId) -> Result<Vec<PublicKey>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM public_key WHERE person_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([person_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Whether this exact armored text is already attached to the person.
pub fn exists_for_person(conn: &Connection, person_id: PersonId, armored: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM public_key WHERE person_id = ?1 AND key = ?2",
            rusqlite::params![person_id, armored],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Replace the key text and its labels.
pub fn update(
    conn: &Connection,
    id: KeyId,
    armored: &str,
    nickname: Option<&str>,
    source: Option<&str>,
) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE public_key SET key = ?1, nickname = ?2, source = ?3 WHERE id = ?4",
            rusqlite::params![armored, nickname, source, id],
        )
        .map_err(|e| DbError::from_write(e, "public key"))?;
    if changed == 0 {
        return Err(DbError::NotFound("public key".into()));
    }
    Ok(())
}

/// Remove a key.
pub fn delete(conn: &Connection, id: KeyId) -> Result<()> {
    conn.execute("DELETE FROM public_key WHERE id = ?1", [id])?;
    Ok(())
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
    fn test_insert_and_list() {
        let (conn, person) = test_db();
        insert(&conn, person, "key-a", Some("laptop.asc"), Some("sealpost"), 10).expect("a");
        insert(&conn, person, "key-b", None, None, 20).expect("b");

        let keys = list_for_person(&conn, person).expect("list");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].armored, "key-a");
        assert_eq!(keys[0].nickname.as_deref(), Some("laptop.asc"));
        assert_eq!(keys[1].source, None);
    }

    #[test]
    fn test_duplicate_key_for_same_person_rejected() {
        let (conn, person) = test_db();
        insert(&conn, person, "key-a", None, None, 10).expect("first");
        let err = insert(&conn, person, "key-a", None, None, 11).expect_err("second");
        assert!(err.is_duplicate());
        assert!(exists_for_person(&conn, person, "key-a").expect("exists"));
        assert!(!exists_for_person(&conn, person, "key-z").expect("exists"));
    }

    #[test]
    fn test_same_key_for_different_people_allowed() {
        let (conn, alice) = test_db();
        let bob = people::insert(&conn, "bob@example.org", 1).expect("bob");
        insert(&conn, alice, "shared", None, None, 1).expect("alice");
        insert(&conn, bob, "shared", None, None, 1).expect("bob");
    }

    #[test]
    fn test_key_requires_owner() {
        let (conn, _) = test_db();
        let err = insert(&conn, 999, "orphan", None, None, 1).expect_err("no owner");
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn test_update_and_delete() {
        let (conn, person) = test_db();
        let id = insert(&conn, person, "old", None, None, 1).expect("insert");

        update(&conn, id, "new", Some("renamed"), Some("url")).expect("update");
        let key = get(&conn, id).expect("get").expect("present");
        assert_eq!(key.armored, "new");
        assert_eq!(key.nickname.as_deref(), Some("renamed"));

        delete(&conn, id).expect("delete");
        assert!(get(&conn, id).expect("get").is_none());
        assert!(matches!(update(&conn, id, "x", None, None), Err(DbError::NotFound(_))));
    }
}
