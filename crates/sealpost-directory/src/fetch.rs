//! Fetch a key from a user-supplied URL.

use std::time::Duration;

use async_trait::async_trait;

use crate::{read_body, DirectoryError, Result, MAX_BODY_BYTES};

/// Retrieve the text behind a URL.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// [`KeyFetcher`] over plain HTTP(S) GET. Bodies larger than
/// [`MAX_BODY_BYTES`] are refused.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl KeyFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let text = read_body(response, url, MAX_BODY_BYTES).await?;
        tracing::debug!(url, bytes = text.len(), "Fetched key URL");
        Ok(text)
    }
}
