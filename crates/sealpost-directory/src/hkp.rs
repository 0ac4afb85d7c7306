//! HKP keyserver client (`/pks/lookup`, machine-readable output).
//!
//! Search is two-step: an `op=index` query lists matching keys, then each
//! usable key is retrieved with `op=get`. Index records look like
//!
//! ```text
//! info:1:2
//! pub:<keyid>:<algo>:<keylen>:<created>:<expires>:<flags>
//! uid:<escaped uid>:<created>:<expires>:<flags>
//! ```
//!
//! Keys flagged revoked (`r`), disabled (`d`) or expired (`e`), or whose
//! expiry time has passed, are skipped.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use sealpost_crypto::armor;
use sealpost_types::{unix_now, KeyCandidate};

use crate::{read_body, DirectoryError, KeyDirectory, Result, MAX_BODY_BYTES};

const LOOKUP_PATH: &str = "/pks/lookup";

/// Client for one HKP keyserver.
#[derive(Clone, Debug)]
pub struct HkpDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HkpDirectory {
    /// `base_url` is the server root, e.g. `https://keys.openpgp.org`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn lookup_url(&self) -> String {
        format!("{}{LOOKUP_PATH}", self.base_url)
    }

    /// Raw body of a lookup. `None` when the server has nothing (404).
    async fn lookup(&self, op: &str, search: &str) -> Result<Option<String>> {
        let url = self.lookup_url();
        let response = self
            .client
            .get(&url)
            .query(&[("op", op), ("options", "mr"), ("search", search)])
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(DirectoryError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(Some(read_body(response, &url, MAX_BODY_BYTES).await?))
    }
}

#[async_trait]
impl KeyDirectory for HkpDirectory {
    async fn search(&self, email: &str) -> Result<Vec<KeyCandidate>> {
        let Some(index) = self.lookup("index", email).await? else {
            tracing::debug!(email, "No directory entries");
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for key_id in parse_index(&index, unix_now()) {
            let Some(text) = self.lookup("get", &format!("0x{key_id}")).await? else {
                continue;
            };
            match armor::validate_public_key(&text) {
                Ok(_) => found.push(KeyCandidate {
                    armored: text.trim().to_string(),
                    source: self.base_url.clone(),
                }),
                Err(e) => tracing::debug!(key_id = %key_id, error = %e, "Discarding unusable directory key"),
            }
        }

        tracing::info!(email, count = found.len(), "Directory search complete");
        Ok(found)
    }
}

/// Key ids of usable `pub:` records in a machine-readable index.
pub fn parse_index(text: &str, now: u64) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix("pub:"))
        .filter_map(|record| {
            let fields: Vec<&str> = record.split(':').collect();
            let key_id = fields.first().copied().filter(|id| !id.is_empty())?;
            let expires = fields.get(4).copied().unwrap_or_default();
            let flags = fields.get(5).copied().unwrap_or_default();

            if flags.chars().any(|c| matches!(c, 'r' | 'd' | 'e')) {
                return None;
            }
            if let Ok(expiry) = expires.parse::<u64>() {
                if expiry <= now {
                    return None;
                }
            }
            Some(key_id.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server;
    use sealpost_crypto::armor::{encode, PUBLIC_KEY_BLOCK};

    const NOW: u64 = 1_700_000_000;

    fn key_text(fill: u8) -> String {
        let mut data = vec![0x99, 0x00, 0x08];
        data.extend_from_slice(&[4, fill, fill, fill, fill, 1, 2, 3]);
        encode(PUBLIC_KEY_BLOCK, &[], &data)
    }

    #[test]
    fn test_parse_index_filters_flags_and_expiry() {
        let index = "info:1:5\n\
                     pub:AAAA1111:1:2048:1500000000::\n\
                     uid:Alice <alice@example.org>:1500000000::\n\
                     pub:BBBB2222:1:2048:1500000000::r\n\
                     pub:CCCC3333:1:2048:1500000000:1600000000:\n\
                     pub:DDDD4444:1:2048:1500000000:1800000000:\n\
                     pub:EEEE5555:1:2048:1500000000::de\n\
                     pub::1:2048:1500000000::\n";
        assert_eq!(parse_index(index, NOW), vec!["AAAA1111", "DDDD4444"]);
    }

    #[test]
    fn test_parse_index_empty() {
        assert!(parse_index("", NOW).is_empty());
        assert!(parse_index("info:1:0\n", NOW).is_empty());
    }

    #[tokio::test]
    async fn test_search_fetches_valid_keys() {
        let good = key_text(1);
        let served = good.clone();
        let addr = test_server::spawn(move |target| {
            if target.contains("op=index") {
                let body = "info:1:3\n\
                            pub:AAAA:1:2048:1::\n\
                            pub:BBBB:1:2048:1::r\n\
                            pub:CCCC:1:2048:1::\n";
                (200, body.to_string())
            } else if target.contains("search=0xAAAA") {
                (200, served.clone())
            } else if target.contains("search=0xCCCC") {
                (200, "not armor".to_string())
            } else {
                (404, String::new())
            }
        })
        .await;

        let base = format!("http://{addr}/");
        let dir = HkpDirectory::new(&base, Duration::from_secs(5)).expect("client");
        let found = dir.search("alice@example.org").await.expect("search");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].armored, good.trim());
        assert_eq!(found[0].source, format!("http://{addr}"));
    }

    #[tokio::test]
    async fn test_search_not_found_is_empty() {
        let addr = test_server::spawn(|_| (404, "No results found".to_string())).await;
        let dir = HkpDirectory::new(&format!("http://{addr}"), Duration::from_secs(5))
            .expect("client");
        assert!(dir.search("nobody@example.org").await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn test_search_server_error() {
        let addr = test_server::spawn(|_| (500, String::new())).await;
        let dir = HkpDirectory::new(&format!("http://{addr}"), Duration::from_secs(5))
            .expect("client");
        assert!(matches!(
            dir.search("alice@example.org").await,
            Err(DirectoryError::Status { status: 500, .. })
        ));
    }
}
