//! Integration test crate for the Sealpost board.
//!
//! The library holds shared fixtures: a board database in a temporary
//! directory, engines opened on it, and in-memory stand-ins for the
//! encryption, directory, fetch and mail capabilities. Several engines
//! opened on one [`Board`] behave like separate daemon processes sharing a
//! store.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p sealpost-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sealpost_crypto::armor::{self, MESSAGE_BLOCK, PUBLIC_KEY_BLOCK};
use sealpost_crypto::{CryptoError, Encryptor, WordList};
use sealpost_db::Database;
use sealpost_directory::{DirectoryError, KeyDirectory, KeyFetcher};
use sealpost_engine::delivery::DeliveryError;
use sealpost_engine::{
    Capabilities, Credentials, Engine, EngineConfig, KeySource, Mailer, OutgoingMail,
};
use sealpost_types::KeyCandidate;
use tempfile::TempDir;

/// Words for session codes in every fixture engine.
pub const WORDS: [&str; 8] = [
    "amber", "birch", "cedar", "delta", "ember", "fjord", "glade", "heron",
];

/// A distinct, well-formed armored public key.
pub fn sample_key(n: u8) -> String {
    armor::encode(PUBLIC_KEY_BLOCK, &[], &[0x99, 0x00, 0x05, 0x04, n, n, n, n])
}

/// A directory candidate carrying [`sample_key`]`(n)`.
pub fn candidate(n: u8) -> KeyCandidate {
    KeyCandidate {
        armored: sample_key(n),
        source: "https://keys.example".into(),
    }
}

/// Armors the plaintext instead of encrypting it.
pub struct PlainEncryptor;

#[async_trait]
impl Encryptor for PlainEncryptor {
    async fn encrypt(
        &self,
        plaintext: &str,
        recipients: &[String],
    ) -> sealpost_crypto::Result<String> {
        if recipients.is_empty() {
            return Err(CryptoError::NoRecipients);
        }
        for key in recipients {
            armor::validate_public_key(key)?;
        }
        Ok(armor::encode(MESSAGE_BLOCK, &[], plaintext.as_bytes()))
    }
}

/// Read back what [`PlainEncryptor`] wrapped.
pub fn open_envelope(envelope: &str) -> String {
    let block = armor::decode(envelope).expect("envelope armor");
    String::from_utf8(block.body).expect("utf-8 plaintext")
}

/// A directory answering from a table after an optional delay, counting
/// how often it was asked.
#[derive(Default)]
pub struct SlowDirectory {
    entries: HashMap<String, Vec<KeyCandidate>>,
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
}

impl SlowDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, email: &str, keys: Vec<KeyCandidate>) -> Self {
        self.entries.insert(email.to_string(), keys);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every search fails as if the directory were unreachable.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyDirectory for SlowDirectory {
    async fn search(&self, email: &str) -> sealpost_directory::Result<Vec<KeyCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(DirectoryError::Status {
                url: "https://keys.example/pks/lookup".into(),
                status: 503,
            });
        }
        Ok(self.entries.get(email).cloned().unwrap_or_default())
    }
}

/// A fetcher with nothing to fetch.
pub struct NoFetcher;

#[async_trait]
impl KeyFetcher for NoFetcher {
    async fn fetch(&self, url: &str) -> sealpost_directory::Result<String> {
        Err(DirectoryError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Keeps every mail in memory.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().expect("mailer lock").clone()
    }

    /// Attachment contents of the last mail to `to`.
    pub fn last_envelope_for(&self, to: &str) -> Option<String> {
        self.sent()
            .iter()
            .rev()
            .find(|m| m.to == to)
            .and_then(|m| m.attachments.first())
            .map(|a| a.contents.clone())
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        self.sent.lock().expect("mailer lock").push(mail.clone());
        Ok(())
    }
}

/// A board database in its own temporary directory.
pub struct Board {
    _dir: TempDir,
    db: Database,
    pub mailer: Arc<MemoryMailer>,
}

impl Board {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::open(&dir.path().join("board.db")).expect("open db");
        Self {
            _dir: dir,
            db,
            mailer: Arc::new(MemoryMailer::default()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// An engine with default settings and no directory hits.
    pub fn engine(&self) -> Engine {
        self.engine_with(Arc::new(SlowDirectory::new()), |_| {})
    }

    /// An engine on this board's database. Must be called inside a Tokio
    /// runtime.
    pub fn engine_with(
        &self,
        directory: Arc<dyn KeyDirectory>,
        configure: impl FnOnce(&mut EngineConfig),
    ) -> Engine {
        let mut config = EngineConfig {
            server_link: "https://board.example".into(),
            ..EngineConfig::default()
        };
        configure(&mut config);
        let caps = Capabilities {
            encryptor: Arc::new(PlainEncryptor),
            directory,
            fetcher: Arc::new(NoFetcher),
            mailer: self.mailer.clone(),
        };
        let words = WordList::new(WORDS).expect("words");
        Engine::new(self.db.clone(), Arc::new(words), caps, config)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Register `email` with key `n`, then sign in through the mailed code.
pub async fn sign_up(engine: &Engine, mailer: &MemoryMailer, email: &str, n: u8) -> Credentials {
    let upload = engine
        .upload_key(
            email,
            KeySource::Text {
                armored: sample_key(n),
                filename: None,
            },
            true,
        )
        .await
        .expect("upload key");
    let envelope = mailer.last_envelope_for(&upload.person.email).expect("session mail");
    let confirmed = engine
        .confirm_session(&open_envelope(&envelope))
        .expect("confirm");
    Credentials {
        session_id: confirmed.session.id,
        person_id: confirmed.person.id,
    }
}
