//! Digest builder: a message joined with its sender, recipients and
//! preview. Digests are rebuilt on every read.

use rusqlite::Connection;
use sealpost_db::queries::{messages, people};
use sealpost_types::{Message, MessageDigest, PersonId};

use crate::error::{EngineError, Result};

/// Build the digest of one message as seen by `requestor`.
///
/// Recipients keep their stored order. `involves_requestor` is true when
/// the requestor wrote or received the message.
pub fn build_digest(
    conn: &Connection,
    message: &Message,
    requestor: Option<PersonId>,
) -> Result<MessageDigest> {
    let sender = people::get(conn, message.author_id)?.ok_or(EngineError::NotFound("sender"))?;

    let recipients = messages::recipients(conn, message.id)?
        .into_iter()
        .map(|id| people::get(conn, id)?.ok_or(EngineError::NotFound("recipient")))
        .collect::<Result<Vec<_>>>()?;

    let involves_requestor = requestor.is_some_and(|id| {
        sender.id == id || recipients.iter().any(|r| r.id == id)
    });

    Ok(MessageDigest {
        preview: message.preview(),
        message: message.clone(),
        sender,
        recipients,
        involves_requestor,
    })
}

/// Build digests for a page of messages, one result per message in order.
pub fn build_digests(
    conn: &Connection,
    page: &[Message],
    requestor: Option<PersonId>,
) -> Vec<Result<MessageDigest>> {
    page.iter()
        .map(|message| build_digest(conn, message, requestor))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealpost_types::NO_PREVIEW;

    struct Fixture {
        conn: Connection,
        alice: PersonId,
        bob: PersonId,
        carol: PersonId,
    }

    fn fixture() -> Fixture {
        let conn = sealpost_db::open_memory().expect("db");
        let alice = people::insert(&conn, "alice@example.org", 1).expect("alice");
        let bob = people::insert(&conn, "bob@example.org", 1).expect("bob");
        let carol = people::insert(&conn, "carol@example.org", 1).expect("carol");
        Fixture {
            conn,
            alice,
            bob,
            carol,
        }
    }

    fn post(f: &Fixture, body: &str, to: &[PersonId]) -> Message {
        let id = messages::insert(&f.conn, f.alice, body, 10, 1_000).expect("insert");
        for r in messages::add_recipients(&f.conn, id, to) {
            r.expect("recipient");
        }
        messages::get(&f.conn, id).expect("get").expect("present")
    }

    #[test]
    fn test_digest_joins_sender_and_ordered_recipients() {
        let f = fixture();
        let message = post(&f, "hi", &[f.carol, f.bob]);

        let digest = build_digest(&f.conn, &message, Some(f.bob)).expect("digest");
        assert_eq!(digest.sender.email, "alice@example.org");
        let order: Vec<&str> = digest.recipients.iter().map(|p| p.email.as_str()).collect();
        assert_eq!(order, vec!["carol@example.org", "bob@example.org"]);
        assert!(digest.involves_requestor);
    }

    #[test]
    fn test_involvement() {
        let f = fixture();
        let message = post(&f, "hi", &[f.bob]);

        let as_author = build_digest(&f.conn, &message, Some(f.alice)).expect("digest");
        let as_outsider = build_digest(&f.conn, &message, Some(f.carol)).expect("digest");
        let anonymous = build_digest(&f.conn, &message, None).expect("digest");
        assert!(as_author.involves_requestor);
        assert!(!as_outsider.involves_requestor);
        assert!(!anonymous.involves_requestor);
    }

    #[test]
    fn test_digest_preview_of_armored_body() {
        let f = fixture();
        let body = "-----BEGIN PGP MESSAGE-----\n\
                    Version: x\n\
                    Comment: y\n\
                    \n\
                    \n\
                    Hello this is a long first real line of content\n\
                    -----END PGP MESSAGE-----\n";
        let message = post(&f, body, &[]);
        let digest = build_digest(&f.conn, &message, None).expect("digest");
        assert_eq!(digest.preview, "Hello this is a long first real li");

        let short = post(&f, "one line", &[]);
        let digest = build_digest(&f.conn, &short, None).expect("digest");
        assert_eq!(digest.preview, NO_PREVIEW);
    }

    #[test]
    fn test_batch_keeps_one_slot_per_message() {
        let f = fixture();
        let good = post(&f, "good", &[f.bob]);
        let orphan = Message {
            id: 999,
            author_id: 12_345,
            body: "lost".into(),
            posted_at: 1,
            expires_at: 2,
        };
        let also_good = post(&f, "also good", &[]);

        let results = build_digests(&f.conn, &[good, orphan, also_good], Some(f.bob));
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(EngineError::NotFound("sender"))));
        assert!(results[2].is_ok());
    }
}
