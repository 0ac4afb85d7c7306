//! Board messages and their read-side digests.

use serde::{Deserialize, Serialize};

use crate::{MessageId, Person, PersonId, NO_PREVIEW, PREVIEW_LENGTH};

/// A posted message. The body is opaque (armored or plain) and immutable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(rename = "person_id")]
    pub author_id: PersonId,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "date_posted")]
    pub posted_at: u64,
    #[serde(rename = "date_expires")]
    pub expires_at: u64,
}

/// Number of leading body lines reserved for armor banners and headers.
const PREVIEW_SKIP_LINES: usize = 4;

impl Message {
    /// First meaningful line of the body, for list views.
    ///
    /// Lines 1-4 are skipped unconditionally. The first later line that is
    /// non-empty and does not start with `-----BEGIN`, `Version:` or
    /// `Comment:` is returned, cut to [`PREVIEW_LENGTH`] characters.
    pub fn preview(&self) -> String {
        self.body
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .skip(PREVIEW_SKIP_LINES)
            .find(|line| {
                !line.is_empty()
                    && !line.starts_with("-----BEGIN")
                    && !line.starts_with("Version:")
                    && !line.starts_with("Comment:")
            })
            .map(|line| line.chars().take(PREVIEW_LENGTH).collect())
            .unwrap_or_else(|| NO_PREVIEW.to_string())
    }
}

/// A message joined with its sender, recipients and preview.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageDigest {
    pub message: Message,
    pub preview: String,
    pub sender: Person,
    /// In persisted recipient order.
    pub recipients: Vec<Person>,
    pub involves_requestor: bool,
}
