//! # sealpost-crypto
//!
//! The OpenPGP-facing capabilities the board consumes.
//!
//! ## Modules
//!
//! - [`armor`] — ASCII armor decode, validate and encode (CRC-24 checked)
//! - [`words`] — Word list and human-readable session code generation
//! - [`envelope`] — Multi-recipient encryption capability and its `gpg` backend

pub mod armor;
pub mod envelope;
pub mod words;

pub use envelope::{Encryptor, GpgEncryptor};
pub use words::WordList;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Text is not well-formed ASCII armor.
    #[error("invalid armor: {0}")]
    InvalidArmor(String),

    /// Armor checksum does not match the decoded body.
    #[error("armor checksum mismatch: expected {expected:06x}, got {actual:06x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Armor is valid but holds the wrong kind of block.
    #[error("expected {expected}, found {found}")]
    WrongBlockKind { expected: String, found: String },

    /// An envelope was requested with no recipients.
    #[error("no recipient keys")]
    NoRecipients,

    /// The word list has no usable entries.
    #[error("word list is empty")]
    EmptyWordList,

    /// The encryption backend failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
