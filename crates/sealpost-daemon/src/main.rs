//! sealpost-daemon: the message board daemon.
//!
//! Single OS process running a Tokio async runtime. The web front end
//! talks to the daemon via JSON-RPC over a Unix socket.

mod commands;
mod config;
mod rpc;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sealpost_crypto::{GpgEncryptor, WordList};
use sealpost_db::Database;
use sealpost_directory::{HkpDirectory, HttpFetcher, KeyDirectory, NullDirectory};
use sealpost_engine::delivery::{DisabledMailer, HttpMailer, MailAddress};
use sealpost_engine::{Capabilities, Engine, Mailer};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use crate::rpc::RpcServer;

/// Timeout for fetching keys by URL and for the mail relay.
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Daemon-wide shared state.
pub struct DaemonState {
    pub engine: Engine,
    /// Configuration.
    pub config: DaemonConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("sealpost={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!("Sealpost daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 2. Open database
    let db = Database::open(&config.database_path())
        .with_context(|| format!("opening {:?}", config.database_path()))?;

    // 3. Build capabilities
    let words = WordList::from_file(std::path::Path::new(&config.session.words_file))
        .with_context(|| format!("loading word list {}", config.session.words_file))?;
    let caps = build_capabilities(&config)?;

    // 4. Build daemon state
    let engine = Engine::new(db, Arc::new(words), caps, config.engine_config());
    let socket_path = config.socket_path();
    let state = Arc::new(DaemonState { engine, config });

    // 5. Start IPC server
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());
    info!("Starting JSON-RPC server on {:?}", socket_path);
    info!(link = %state.config.server.server_link(), "Board reachable");

    // 6. Run the RPC server until shutdown
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = terminate.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    // Graceful shutdown
    info!("Daemon shutting down gracefully");
    let stats = state.engine.shutdown().await;
    info!(
        created = stats.created,
        duplicates = stats.duplicates,
        failed = stats.failed,
        "Provisioning worker drained"
    );

    // Clean up socket file
    let _ = std::fs::remove_file(&socket_path);

    info!("Daemon stopped");
    Ok(())
}

/// Wire the engine's collaborators from configuration.
fn build_capabilities(config: &DaemonConfig) -> anyhow::Result<Capabilities> {
    let directory: Arc<dyn KeyDirectory> = if config.directory.enabled {
        Arc::new(HkpDirectory::new(
            &config.directory.hkp_url,
            config.directory.timeout(),
        )?)
    } else {
        info!("External key directory disabled");
        Arc::new(NullDirectory)
    };

    let mailer: Arc<dyn Mailer> = if config.mail.relay_url.is_empty() {
        warn!("No mail relay configured, session codes cannot be delivered");
        Arc::new(DisabledMailer)
    } else {
        let sender = MailAddress {
            display_name: config.mail.display_name.clone(),
            address: config.mail.sender.clone(),
        };
        Arc::new(HttpMailer::new(&config.mail.relay_url, sender, HTTP_TIMEOUT)?)
    };

    Ok(Capabilities {
        encryptor: Arc::new(GpgEncryptor::new(&config.crypto.gpg_binary)),
        directory,
        fetcher: Arc::new(HttpFetcher::new(HTTP_TIMEOUT)?),
        mailer,
    })
}
