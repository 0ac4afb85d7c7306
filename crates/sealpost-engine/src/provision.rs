//! Background creation of identities found in an external directory.
//!
//! A key search that finds keys outside the local store answers the caller
//! immediately and queues a [`ProvisionRequest`]. A single worker task
//! drains the queue. Its failure policy is log-and-drop: a
//! [`EngineError::DuplicateIdentity`] means another request (or another
//! process) created the person first, which is the expected outcome of a
//! race and is only counted.

use sealpost_db::queries::people;
use sealpost_db::Database;
use sealpost_types::{unix_now, KeyCandidate, KeyId, PersonId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::{EngineError, Result};

/// Create `email` with these keys unless it already exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub email: String,
    pub keys: Vec<KeyCandidate>,
}

/// A successfully created identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provisioned {
    pub person_id: PersonId,
    pub key_ids: Vec<KeyId>,
}

/// What the worker did with the requests it received.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProvisionStats {
    pub created: usize,
    /// Requests that lost the race to an existing identity.
    pub duplicates: usize,
    pub failed: usize,
}

/// Create the person and its keys in one transaction.
///
/// Fails with [`EngineError::DuplicateIdentity`] if the email is already
/// registered, in which case nothing is written.
pub fn provision(db: &Database, request: &ProvisionRequest, now: u64) -> Result<Provisioned> {
    let mut keys: Vec<KeyCandidate> = Vec::with_capacity(request.keys.len());
    for key in &request.keys {
        if !keys.iter().any(|k| k.armored == key.armored) {
            keys.push(key.clone());
        }
    }

    let mut conn = db.connect()?;
    let (person_id, key_ids) = people::insert_with_keys(&mut conn, &request.email, &keys, now)?;
    Ok(Provisioned { person_id, key_ids })
}

/// Handle to the provisioning worker.
pub struct Provisioner {
    tx: Mutex<Option<mpsc::Sender<ProvisionRequest>>>,
    worker: Mutex<Option<JoinHandle<ProvisionStats>>>,
}

impl Provisioner {
    /// Start the worker on the current runtime.
    pub fn spawn(db: Database, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run(db, rx));
        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue a request without waiting for room. Returns false when the
    /// request was dropped because the queue is full or closed.
    pub async fn enqueue(&self, request: ProvisionRequest) -> bool {
        let Some(tx) = self.tx.lock().await.clone() else {
            tracing::warn!(email = %request.email, "Provisioner closed, dropping request");
            return false;
        };
        match tx.try_send(request) {
            Ok(()) => true,
            Err(TrySendError::Full(request)) => {
                tracing::warn!(email = %request.email, "Provisioning queue full, dropping request");
                false
            }
            Err(TrySendError::Closed(request)) => {
                tracing::warn!(email = %request.email, "Provisioning worker gone, dropping request");
                false
            }
        }
    }

    /// Close the queue, let the worker drain it, and return its totals.
    ///
    /// A second call returns empty totals.
    pub async fn shutdown(&self) -> ProvisionStats {
        self.tx.lock().await.take();
        let Some(worker) = self.worker.lock().await.take() else {
            return ProvisionStats::default();
        };
        match worker.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(error = %e, "Provisioning worker panicked");
                ProvisionStats::default()
            }
        }
    }
}

async fn run(db: Database, mut rx: mpsc::Receiver<ProvisionRequest>) -> ProvisionStats {
    let mut stats = ProvisionStats::default();
    while let Some(request) = rx.recv().await {
        let email = request.email.clone();
        let db = db.clone();
        let outcome =
            tokio::task::spawn_blocking(move || provision(&db, &request, unix_now())).await;

        match outcome {
            Ok(Ok(done)) => {
                stats.created += 1;
                tracing::info!(
                    email = %email,
                    person_id = done.person_id,
                    keys = done.key_ids.len(),
                    "Provisioned identity from directory"
                );
            }
            Ok(Err(EngineError::DuplicateIdentity)) => {
                stats.duplicates += 1;
                tracing::warn!(email = %email, "Identity already exists, dropping provisioning request");
            }
            Ok(Err(e)) => {
                stats.failed += 1;
                tracing::warn!(email = %email, error = %e, "Provisioning failed");
            }
            Err(e) => {
                stats.failed += 1;
                tracing::error!(email = %email, error = %e, "Provisioning task aborted");
            }
        }
    }
    tracing::debug!(?stats, "Provisioning worker stopped");
    stats
}
