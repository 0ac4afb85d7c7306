//! Engine error taxonomy.
//!
//! Validation failures (`InvalidSession`, `Disabled`, `InvalidEmail`, ...)
//! are meant to be shown to the user. `Transport` hides store and network
//! detail behind a generic message; the detail is logged where it occurs.

use sealpost_crypto::CryptoError;
use sealpost_db::DbError;
use sealpost_directory::DirectoryError;

use crate::delivery::DeliveryError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Expired, unverified, unknown, or not owned by the claimed person.
    #[error("invalid session")]
    InvalidSession,

    #[error("account disabled")]
    Disabled,

    #[error("identity already exists")]
    DuplicateIdentity,

    #[error("no public keys to encrypt to")]
    NoRecipientKeys,

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("invalid email address")]
    InvalidEmail,

    #[error("message is empty")]
    EmptyMessage,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate(_) => EngineError::DuplicateIdentity,
            other => {
                tracing::error!(error = %other, "Store failure");
                EngineError::Transport(other.to_string())
            }
        }
    }
}

impl From<CryptoError> for EngineError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidArmor(_)
            | CryptoError::ChecksumMismatch { .. }
            | CryptoError::WrongBlockKind { .. } => EngineError::InvalidKeyFormat(err.to_string()),
            CryptoError::NoRecipients => EngineError::NoRecipientKeys,
            other => {
                tracing::error!(error = %other, "Encryption failure");
                EngineError::Transport(other.to_string())
            }
        }
    }
}

impl From<DirectoryError> for EngineError {
    fn from(err: DirectoryError) -> Self {
        tracing::warn!(error = %err, "Directory failure");
        EngineError::Transport(err.to_string())
    }
}

impl From<DeliveryError> for EngineError {
    fn from(err: DeliveryError) -> Self {
        tracing::warn!(error = %err, "Delivery failure");
        EngineError::Delivery(err.to_string())
    }
}
