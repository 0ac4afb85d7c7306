//! Test doubles for the engine's collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sealpost_crypto::armor::{self, MESSAGE_BLOCK, PUBLIC_KEY_BLOCK};
use sealpost_crypto::{CryptoError, Encryptor, WordList};
use sealpost_db::Database;
use sealpost_directory::{DirectoryError, KeyDirectory, KeyFetcher};
use sealpost_types::KeyCandidate;
use tempfile::TempDir;

use crate::delivery::{DeliveryError, Mailer, OutgoingMail};
use crate::{Capabilities, Engine, EngineConfig};

/// A migrated database file in a fresh temporary directory.
pub fn file_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::open(&dir.path().join("board.db")).expect("open db");
    (dir, db)
}

/// A distinct, well-formed armored public key.
pub fn sample_key(n: u8) -> String {
    let data = [0x99, 0x00, 0x05, 0x04, n, n, n, n];
    armor::encode(PUBLIC_KEY_BLOCK, &[], &data)
}

/// "Encrypts" by armoring the plaintext, so tests can read the code back.
pub struct ArmorEncryptor;

#[async_trait]
impl Encryptor for ArmorEncryptor {
    async fn encrypt(&self, plaintext: &str, recipients: &[String]) -> sealpost_crypto::Result<String> {
        if recipients.is_empty() {
            return Err(CryptoError::NoRecipients);
        }
        for key in recipients {
            armor::validate_public_key(key)?;
        }
        let count = recipients.len().to_string();
        Ok(armor::encode(
            MESSAGE_BLOCK,
            &[("Recipients", count.as_str())],
            plaintext.as_bytes(),
        ))
    }
}

/// Recover the plaintext from an [`ArmorEncryptor`] envelope.
pub fn open_envelope(ciphertext: &str) -> String {
    let block = armor::decode(ciphertext).expect("envelope armor");
    String::from_utf8(block.body).expect("utf-8 code")
}

/// Directory answering from a fixed table.
#[derive(Default)]
pub struct TableDirectory {
    pub entries: HashMap<String, Vec<KeyCandidate>>,
}

#[async_trait]
impl KeyDirectory for TableDirectory {
    async fn search(&self, email: &str) -> sealpost_directory::Result<Vec<KeyCandidate>> {
        Ok(self.entries.get(email).cloned().unwrap_or_default())
    }
}

/// Fetcher answering from a fixed table.
#[derive(Default)]
pub struct TableFetcher {
    pub pages: HashMap<String, String>,
}

#[async_trait]
impl KeyFetcher for TableFetcher {
    async fn fetch(&self, url: &str) -> sealpost_directory::Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| DirectoryError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Mailer that keeps every mail, or refuses all of them.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingMail>>,
    pub refuse: bool,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        if self.refuse {
            return Err(DeliveryError::Rejected(503));
        }
        self.sent.lock().expect("mailer lock").push(mail.clone());
        Ok(())
    }
}

/// An engine over a fresh file database with test doubles.
pub struct Harness {
    pub dir: TempDir,
    pub engine: Engine,
    pub mailer: Arc<RecordingMailer>,
}

pub struct HarnessBuilder {
    directory: TableDirectory,
    fetcher: TableFetcher,
    mailer: RecordingMailer,
    config: EngineConfig,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            directory: TableDirectory::default(),
            fetcher: TableFetcher::default(),
            mailer: RecordingMailer::default(),
            config: EngineConfig {
                server_link: "https://board.example".into(),
                ..EngineConfig::default()
            },
        }
    }

    pub fn directory_entry(mut self, email: &str, keys: Vec<KeyCandidate>) -> Self {
        self.directory.entries.insert(email.to_string(), keys);
        self
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.fetcher.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn refusing_mailer(mut self) -> Self {
        self.mailer.refuse = true;
        self
    }

    pub fn config(mut self, f: impl FnOnce(&mut EngineConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn build(self) -> Harness {
        let (dir, db) = file_db();
        let words = WordList::new(["amber", "birch", "cedar", "delta", "ember", "fjord"])
            .expect("words");
        let mailer = Arc::new(self.mailer);
        let caps = Capabilities {
            encryptor: Arc::new(ArmorEncryptor),
            directory: Arc::new(self.directory),
            fetcher: Arc::new(self.fetcher),
            mailer: mailer.clone(),
        };
        Harness {
            dir,
            engine: Engine::new(db, Arc::new(words), caps, self.config),
            mailer,
        }
    }
}
