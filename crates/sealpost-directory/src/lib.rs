//! # sealpost-directory
//!
//! Where keys come from when they are not stored locally.
//!
//! - [`KeyDirectory`] answers "which public keys are published for this
//!   email?" Zero results is a normal answer.
//! - [`KeyFetcher`] retrieves a key the user pointed at by URL.
//!
//! Both return raw armored text; nothing here writes to the database.

pub mod fetch;
pub mod hkp;

use async_trait::async_trait;
use sealpost_types::KeyCandidate;

pub use fetch::{HttpFetcher, KeyFetcher};
pub use hkp::HkpDirectory;

/// Error types for directory and fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{url} response exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Largest response body read from a keyserver or key URL.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Read a response body as text, giving up past `limit` bytes.
pub(crate) async fn read_body(
    mut response: reqwest::Response,
    url: &str,
    limit: usize,
) -> Result<String> {
    let too_large = || DirectoryError::TooLarge {
        url: url.to_string(),
        limit,
    };
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    String::from_utf8(body)
        .map_err(|_| DirectoryError::InvalidResponse(format!("{url} is not UTF-8")))
}

/// Search an external key directory by email.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    /// Valid, non-revoked public keys published for `email`.
    async fn search(&self, email: &str) -> Result<Vec<KeyCandidate>>;
}

/// A directory that never finds anything. Used when external lookups are
/// switched off.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDirectory;

#[async_trait]
impl KeyDirectory for NullDirectory {
    async fn search(&self, _email: &str) -> Result<Vec<KeyCandidate>> {
        Ok(Vec::new())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_directory_finds_nothing() {
        let found = NullDirectory.search("alice@example.org").await.expect("search");
        assert!(found.is_empty());
    }
}
