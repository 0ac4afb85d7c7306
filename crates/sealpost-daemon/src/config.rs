//! Configuration file management.

use std::path::PathBuf;
use std::time::Duration;

use sealpost_engine::EngineConfig;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SEALPOST_DATA_DIR";

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub crypto: CryptoConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Public address of the board and the local RPC socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_external_port")]
    pub external_port: u16,
    #[serde(default = "default_true")]
    pub use_ssl: bool,
    /// RPC socket. Empty = $data_dir/sealpost.sock.
    #[serde(default)]
    pub socket_path: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
}

/// Session code settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Newline-separated word list.
    #[serde(default = "default_words_file")]
    pub words_file: String,
    #[serde(default = "default_word_count")]
    pub word_count: usize,
    #[serde(default = "default_session_minutes")]
    pub duration_minutes: u64,
}

/// Message lifetime and paging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_message_days")]
    pub duration_days: u64,
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u32,
}

/// External key directory (HKP).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_hkp_url")]
    pub hkp_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Outgoing mail relay. No relay URL = session mails cannot be sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub relay_url: String,
    #[serde(default = "default_sender")]
    pub sender: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    #[serde(default = "default_gpg_binary")]
    pub gpg_binary: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_host() -> String {
    "teamwork.local".to_string()
}

fn default_external_port() -> u16 {
    443
}

fn default_true() -> bool {
    true
}

fn default_words_file() -> String {
    "/usr/share/dict/words".to_string()
}

fn default_word_count() -> usize {
    sealpost_types::SESSION_WORDS
}

fn default_session_minutes() -> u64 {
    sealpost_types::SESSION_DURATION_SECS / 60
}

fn default_message_days() -> u64 {
    sealpost_types::MESSAGE_DURATION_SECS / (24 * 60 * 60)
}

fn default_posts_per_page() -> u32 {
    sealpost_types::POSTS_PER_PAGE
}

fn default_hkp_url() -> String {
    "https://keys.openpgp.org".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_sender() -> String {
    "noreply@teamwork.local".to_string()
}

fn default_display_name() -> String {
    "Sealpost".to_string()
}

fn default_gpg_binary() -> String {
    "gpg".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            external_port: default_external_port(),
            use_ssl: true,
            socket_path: String::new(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            words_file: default_words_file(),
            word_count: default_word_count(),
            duration_minutes: default_session_minutes(),
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            duration_days: default_message_days(),
            posts_per_page: default_posts_per_page(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            hkp_url: default_hkp_url(),
            timeout_secs: default_timeout_secs(),
            enabled: true,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: String::new(),
            sender: default_sender(),
            display_name: default_display_name(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            gpg_binary: default_gpg_binary(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Base URL users reach the board at. The port is left out when it is
    /// the scheme's default.
    pub fn server_link(&self) -> String {
        let (scheme, default_port) = if self.use_ssl {
            ("https", 443)
        } else {
            ("http", 80)
        };
        if self.external_port == default_port {
            format!("{scheme}://{}", self.host)
        } else {
            format!("{scheme}://{}:{}", self.host, self.external_port)
        }
    }
}

impl DirectoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse a TOML document. Missing sections and keys take defaults.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.storage.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.storage.data_dir)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("sealpost.db")
    }

    pub fn socket_path(&self) -> PathBuf {
        if self.server.socket_path.is_empty() {
            self.data_dir().join("sealpost.sock")
        } else {
            PathBuf::from(&self.server.socket_path)
        }
    }

    /// Engine tunables derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            session_words: self.session.word_count,
            session_duration_secs: self.session.duration_minutes * 60,
            message_duration_secs: self.messages.duration_days * 24 * 60 * 60,
            posts_per_page: self.messages.posts_per_page,
            server_link: self.server.server_link(),
            ..EngineConfig::default()
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Sealpost")
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs_fallback(".sealpost")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/sealpost"))
}
