//! Out-of-band delivery of session codes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

/// A file attached to an outgoing mail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub contents: String,
}

/// A mail to a single recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relay rejected mail with status {0}")]
    Rejected(u16),

    #[error("no mail relay configured")]
    NotConfigured,
}

/// Send mail. Failure is terminal for the request that asked for it.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError>;
}

/// Sender identity on outgoing mail.
#[derive(Clone, Debug, Serialize)]
pub struct MailAddress {
    pub display_name: String,
    pub address: String,
}

/// [`Mailer`] that posts each mail as JSON to an HTTP relay.
#[derive(Clone, Debug)]
pub struct HttpMailer {
    client: reqwest::Client,
    relay_url: String,
    sender: MailAddress,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a MailAddress,
    #[serde(flatten)]
    mail: &'a OutgoingMail,
}

impl HttpMailer {
    pub fn new(relay_url: &str, sender: MailAddress, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            relay_url: relay_url.to_string(),
            sender,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.relay_url)
            .json(&RelayRequest {
                from: &self.sender,
                mail,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected(status.as_u16()));
        }
        tracing::info!(subject = %mail.subject, "Mail handed to relay");
        Ok(())
    }
}

/// [`Mailer`] used when no relay is configured. Every send fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _mail: &OutgoingMail) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_payload_shape() {
        let sender = MailAddress {
            display_name: "Sealpost".into(),
            address: "noreply@example.org".into(),
        };
        let mail = OutgoingMail {
            to: "alice@example.org".into(),
            subject: "Your session code".into(),
            body: "hello".into(),
            attachments: vec![Attachment {
                filename: "session-1.asc".into(),
                content_type: "application/pgp-encrypted".into(),
                contents: "-----BEGIN PGP MESSAGE-----".into(),
            }],
        };
        let json = serde_json::to_value(RelayRequest {
            from: &sender,
            mail: &mail,
        })
        .expect("serialize");
        assert_eq!(json["from"]["address"], "noreply@example.org");
        assert_eq!(json["to"], "alice@example.org");
        assert_eq!(json["attachments"][0]["filename"], "session-1.asc");
    }

    #[tokio::test]
    async fn test_disabled_mailer_fails() {
        let mail = OutgoingMail {
            to: "a@example.org".into(),
            subject: String::new(),
            body: String::new(),
            attachments: Vec::new(),
        };
        assert!(matches!(
            DisabledMailer.send(&mail).await,
            Err(DeliveryError::NotConfigured)
        ));
    }
}
