//! # sealpost-engine
//!
//! Protocol logic of the board. Every operation starts with the expiry
//! sweep it depends on, resolves the acting person, validates state and
//! only then mutates or queries. The store is the only place where mutual
//! exclusion happens; several engines may share one database file.
//!
//! ## Modules
//!
//! - [`sessions`] — create, request, confirm and sweep sessions
//! - [`auth`] — credential checks for session-bound operations
//! - [`posting`] — post, list and download messages
//! - [`digest`] — sender/recipient/preview views of messages
//! - [`discovery`] — local-first key search with directory fallback
//! - [`provision`] — background creation of discovered identities
//! - [`keys`] — key upload and listing
//! - [`delivery`] — the mail capability

pub mod auth;
pub mod delivery;
pub mod digest;
pub mod discovery;
pub mod error;
pub mod keys;
pub mod posting;
pub mod provision;
pub mod sessions;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use sealpost_crypto::{Encryptor, WordList};
use sealpost_db::Database;
use sealpost_directory::{KeyDirectory, KeyFetcher};
use sealpost_types::{
    KEY_SOURCE, MESSAGE_DURATION_SECS, POSTS_PER_PAGE, SESSION_DURATION_SECS, SESSION_WORDS,
};

pub use auth::{Authorized, Credentials};
pub use delivery::{Attachment, Mailer, OutgoingMail};
pub use discovery::KeySearch;
pub use error::{EngineError, Result};
pub use keys::{KeySource, KeyUpload};
pub use posting::{MessageDownload, PostOutcome, RecipientFailure, RecipientProblem};
pub use provision::{ProvisionRequest, ProvisionStats, Provisioner};
pub use sessions::{Confirmation, CreatedSession};

/// Tunables of the engine.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Words per session code.
    pub session_words: usize,
    pub session_duration_secs: u64,
    pub message_duration_secs: u64,
    pub posts_per_page: u32,
    /// Source tag stored on keys uploaded to this board.
    pub key_source: String,
    /// Public base URL, quoted in session mails.
    pub server_link: String,
    /// Pending background provisioning requests before senders wait.
    pub provision_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_words: SESSION_WORDS,
            session_duration_secs: SESSION_DURATION_SECS,
            message_duration_secs: MESSAGE_DURATION_SECS,
            posts_per_page: POSTS_PER_PAGE,
            key_source: KEY_SOURCE.to_string(),
            server_link: String::new(),
            provision_queue: 64,
        }
    }
}

/// External collaborators the engine calls out to.
#[derive(Clone)]
pub struct Capabilities {
    pub encryptor: Arc<dyn Encryptor>,
    pub directory: Arc<dyn KeyDirectory>,
    pub fetcher: Arc<dyn KeyFetcher>,
    pub mailer: Arc<dyn Mailer>,
}

/// The board engine. Cheap to share behind an `Arc`.
pub struct Engine {
    db: Database,
    words: Arc<WordList>,
    caps: Capabilities,
    provisioner: Provisioner,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine and start its provisioning worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        db: Database,
        words: Arc<WordList>,
        caps: Capabilities,
        config: EngineConfig,
    ) -> Self {
        let provisioner = Provisioner::spawn(db.clone(), config.provision_queue);
        Self {
            db,
            words,
            caps,
            provisioner,
            config,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stop accepting provisioning work and wait for queued requests to
    /// finish.
    pub async fn shutdown(&self) -> ProvisionStats {
        self.provisioner.shutdown().await
    }
}
