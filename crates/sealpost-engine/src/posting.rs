//! Posting, listing and downloading messages.

use std::fmt;

use rusqlite::Connection;
use sealpost_db::queries::messages::{self, MessageFilter};
use sealpost_db::queries::people;
use sealpost_db::DbError;
use sealpost_types::{normalize_email, unix_now, Message, MessageDigest, MessageId, PersonId};

use crate::auth::{authorize_on, Credentials};
use crate::digest::build_digests;
use crate::error::{EngineError, Result};
use crate::Engine;

/// Why a recipient could not be attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecipientProblem {
    UnknownPerson,
    AlreadyAdded,
    Store(String),
}

impl fmt::Display for RecipientProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientProblem::UnknownPerson => write!(f, "no such person"),
            RecipientProblem::AlreadyAdded => write!(f, "already a recipient"),
            RecipientProblem::Store(detail) => write!(f, "{detail}"),
        }
    }
}

/// A recipient that was left off a posted message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipientFailure {
    pub email: String,
    pub problem: RecipientProblem,
}

/// A posted message and what became of each requested recipient.
#[derive(Clone, Debug)]
pub struct PostOutcome {
    pub message: Message,
    /// Attached recipients, in request order.
    pub recipients: Vec<PersonId>,
    pub failures: Vec<RecipientFailure>,
}

/// Body of a stored message ready for download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageDownload {
    pub filename: String,
    pub body: String,
}

/// Delete expired messages. Per-message failures are logged and retried by
/// the next sweep.
pub(crate) fn sweep_expired_messages(conn: &Connection, now: u64) {
    match messages::sweep_expired(conn, now) {
        Ok(report) => {
            if report.removed > 0 {
                tracing::debug!(removed = report.removed, "Swept expired messages");
            }
            for (message_id, e) in report.failures {
                tracing::warn!(message_id, error = %e, "Could not remove expired message");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Message sweep failed"),
    }
}

impl Engine {
    /// Post a message and address it to `recipients` (emails).
    ///
    /// The message is stored before any recipient is attached. Recipients
    /// that cannot be attached are reported in the outcome and do not fail
    /// the post.
    pub fn post_message(
        &self,
        creds: Credentials,
        body: &str,
        recipients: &[String],
    ) -> Result<PostOutcome> {
        if body.trim().is_empty() {
            return Err(EngineError::EmptyMessage);
        }

        let conn = self.db.connect()?;
        let now = unix_now();
        let author = authorize_on(&conn, creds, now)?.person;
        sweep_expired_messages(&conn, now);

        let expires_at = now + self.config.message_duration_secs;
        let message_id = messages::insert(&conn, author.id, body, now, expires_at)?;
        let message = Message {
            id: message_id,
            author_id: author.id,
            body: body.to_string(),
            posted_at: now,
            expires_at,
        };

        let mut failures = Vec::new();
        let mut resolved: Vec<(String, PersonId)> = Vec::with_capacity(recipients.len());
        for email in recipients {
            let email = normalize_email(email);
            if email.is_empty() {
                continue;
            }
            match people::find_by_email(&conn, &email) {
                Ok(Some(person)) => resolved.push((email, person.id)),
                Ok(None) => failures.push(RecipientFailure {
                    email,
                    problem: RecipientProblem::UnknownPerson,
                }),
                Err(e) => failures.push(RecipientFailure {
                    email,
                    problem: RecipientProblem::Store(e.to_string()),
                }),
            }
        }

        let ids: Vec<PersonId> = resolved.iter().map(|(_, id)| *id).collect();
        let mut attached = Vec::with_capacity(ids.len());
        for ((email, person_id), result) in resolved
            .into_iter()
            .zip(messages::add_recipients(&conn, message_id, &ids))
        {
            match result {
                Ok(()) => attached.push(person_id),
                Err(DbError::Duplicate(_)) => failures.push(RecipientFailure {
                    email,
                    problem: RecipientProblem::AlreadyAdded,
                }),
                Err(e) => failures.push(RecipientFailure {
                    email,
                    problem: RecipientProblem::Store(e.to_string()),
                }),
            }
        }

        for failure in &failures {
            tracing::warn!(
                message_id,
                email = %failure.email,
                problem = %failure.problem,
                "Recipient not attached"
            );
        }
        tracing::info!(
            message_id,
            author_id = author.id,
            recipients = attached.len(),
            "Message posted"
        );

        Ok(PostOutcome {
            message,
            recipients: attached,
            failures,
        })
    }

    /// One page of the board, newest first.
    ///
    /// With credentials the page holds messages the person wrote or
    /// received; without, every live message. Messages whose digest cannot
    /// be built are logged and left out.
    pub fn list_posts(&self, creds: Option<Credentials>, page: u32) -> Result<Vec<MessageDigest>> {
        let conn = self.db.connect()?;
        let now = unix_now();
        let requestor = match creds {
            Some(creds) => Some(authorize_on(&conn, creds, now)?.person.id),
            None => None,
        };
        sweep_expired_messages(&conn, now);

        let filter = match requestor {
            Some(id) => MessageFilter::LatestInvolving(id),
            None => MessageFilter::LatestGlobal,
        };
        let limit = self.config.posts_per_page;
        let rows = messages::retrieve(&conn, filter, limit, page.saturating_mul(limit))?;

        let digests = build_digests(&conn, &rows, requestor)
            .into_iter()
            .zip(&rows)
            .filter_map(|(result, message)| match result {
                Ok(digest) => Some(digest),
                Err(e) => {
                    tracing::warn!(message_id = message.id, error = %e, "Dropping undigestible message");
                    None
                }
            })
            .collect();
        Ok(digests)
    }

    /// The stored body of a message, for download as `<id>.asc`.
    pub fn fetch_message(&self, id: MessageId) -> Result<MessageDownload> {
        let conn = self.db.connect()?;
        sweep_expired_messages(&conn, unix_now());
        let message = messages::get(&conn, id)?.ok_or(EngineError::NotFound("message"))?;
        Ok(MessageDownload {
            filename: format!("{}.asc", message.id),
            body: message.body,
        })
    }

    /// Run the message sweep on its own.
    pub fn sweep_messages(&self) -> Result<messages::SweepReport> {
        let conn = self.db.connect()?;
        Ok(messages::sweep_expired(&conn, unix_now())?)
    }
}
