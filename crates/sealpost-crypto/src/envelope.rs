//! Multi-recipient encryption.
//!
//! One envelope is produced per call, decryptable by any one of the
//! recipients' private keys.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::armor::{self, MESSAGE_BLOCK};
use crate::{CryptoError, Result};

/// Encrypt text to a set of armored public keys.
#[async_trait]
pub trait Encryptor: Send + Sync {
    /// Returns an armored `PGP MESSAGE`. Fails if `recipients` is empty or
    /// any key cannot be parsed.
    async fn encrypt(&self, plaintext: &str, recipients: &[String]) -> Result<String>;
}

/// [`Encryptor`] backed by the `gpg` binary.
///
/// Every call runs in a throwaway home directory holding only the
/// recipient keys, so the host keyring is never read or modified.
#[derive(Clone, Debug)]
pub struct GpgEncryptor {
    binary: PathBuf,
}

impl GpgEncryptor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for GpgEncryptor {
    fn default() -> Self {
        Self::new("gpg")
    }
}

#[async_trait]
impl Encryptor for GpgEncryptor {
    async fn encrypt(&self, plaintext: &str, recipients: &[String]) -> Result<String> {
        if recipients.is_empty() {
            return Err(CryptoError::NoRecipients);
        }
        for key in recipients {
            armor::validate_public_key(key)?;
        }

        let home = tempfile::tempdir()?;
        let mut key_files = Vec::with_capacity(recipients.len());
        for (index, key) in recipients.iter().enumerate() {
            let path = home.path().join(format!("recipient-{index}.asc"));
            tokio::fs::write(&path, key).await?;
            key_files.push(path);
        }

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--batch")
            .arg("--no-tty")
            .arg("--quiet")
            .arg("--homedir")
            .arg(home.path())
            .args(["--trust-model", "always", "--armor", "--encrypt"]);
        for path in &key_files {
            cmd.arg("--recipient-file").arg(path);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(plaintext.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(status = %output.status, "gpg encryption failed");
            return Err(CryptoError::Encryption(stderr.trim().to_string()));
        }

        let ciphertext = String::from_utf8(output.stdout)
            .map_err(|_| CryptoError::Encryption("gpg produced non-UTF-8 output".into()))?;
        let block = armor::decode(&ciphertext)?;
        if block.kind != MESSAGE_BLOCK {
            return Err(CryptoError::WrongBlockKind {
                expected: MESSAGE_BLOCK.into(),
                found: block.kind,
            });
        }

        tracing::debug!(recipients = recipients.len(), "Encrypted envelope");
        Ok(ciphertext)
    }
}
