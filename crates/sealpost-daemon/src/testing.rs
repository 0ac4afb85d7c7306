//! Daemon state over a scratch database, for handler tests.

use std::sync::Arc;
use std::time::Duration;

use sealpost_crypto::armor::{self, PUBLIC_KEY_BLOCK};
use sealpost_crypto::{GpgEncryptor, WordList};
use sealpost_db::queries::{people, public_keys, sessions};
use sealpost_db::Database;
use sealpost_directory::{HttpFetcher, NullDirectory};
use sealpost_engine::delivery::DisabledMailer;
use sealpost_engine::{Capabilities, Credentials, Engine};
use tempfile::TempDir;

use crate::config::DaemonConfig;
use crate::DaemonState;

/// A distinct, well-formed armored public key.
pub fn sample_key(n: u8) -> String {
    armor::encode(PUBLIC_KEY_BLOCK, &[], &[0x99, 0x00, 0x05, 0x04, n, n, n, n])
}

/// Daemon state with no directory and no mail relay. Must run inside a
/// Tokio runtime.
pub fn test_state() -> (TempDir, Arc<DaemonState>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = DaemonConfig::default();
    config.storage.data_dir = dir.path().display().to_string();
    config.directory.enabled = false;

    let db = Database::open(&config.database_path()).expect("open db");
    let words = WordList::new(["amber", "birch", "cedar", "delta"]).expect("words");
    let caps = Capabilities {
        encryptor: Arc::new(GpgEncryptor::default()),
        directory: Arc::new(NullDirectory),
        fetcher: Arc::new(HttpFetcher::new(Duration::from_secs(1)).expect("fetcher")),
        mailer: Arc::new(DisabledMailer),
    };
    let engine = Engine::new(db, Arc::new(words), caps, config.engine_config());
    (dir, Arc::new(DaemonState { engine, config }))
}

/// Register `email` with one key and a confirmed session.
pub fn signed_in(state: &DaemonState, email: &str) -> Credentials {
    let conn = state.engine.database().connect().expect("connect");
    let person_id = people::insert(&conn, email, 1).expect("person");
    public_keys::insert(&conn, person_id, &sample_key(person_id as u8), None, None, 1)
        .expect("key");
    let session_id = sessions::insert(&conn, person_id, &format!("code for {email}"), 1, u64::MAX / 2)
        .expect("session");
    sessions::mark_verified(&conn, session_id, 2).expect("verify");
    Credentials {
        session_id,
        person_id,
    }
}
