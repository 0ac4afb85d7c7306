//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! JSON-RPC method calls to the appropriate command handlers. One request
//! per line, one response per line.

use std::path::PathBuf;
use std::sync::Arc;

use sealpost_engine::EngineError;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    fn bare(code: i32, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: None,
        }
    }

    fn with_detail(code: i32, message: &str, detail: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self::bare(-32700, "PARSE_ERROR")
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self::bare(-32600, "INVALID_REQUEST")
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::with_detail(-32602, "INVALID_PARAMS", detail)
    }

    /// Internal error (-32603). Carries no detail; the cause is logged.
    pub fn internal_error() -> Self {
        Self::bare(-32603, "INTERNAL_ERROR")
    }

    // Board errors

    /// Not found (-32001).
    pub fn not_found(what: &str) -> Self {
        Self {
            code: -32001,
            message: "NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"what": what})),
        }
    }

    /// Invalid session (-32010).
    pub fn invalid_session() -> Self {
        Self::bare(-32010, "INVALID_SESSION")
    }

    /// Account disabled (-32011).
    pub fn account_disabled() -> Self {
        Self::bare(-32011, "ACCOUNT_DISABLED")
    }

    /// Identity already exists (-32012).
    pub fn duplicate_identity() -> Self {
        Self::bare(-32012, "DUPLICATE_IDENTITY")
    }

    /// No keys to encrypt to (-32020).
    pub fn no_recipient_keys() -> Self {
        Self::bare(-32020, "NO_RECIPIENT_KEYS")
    }

    /// Key rejected (-32021).
    pub fn invalid_key_format(detail: &str) -> Self {
        Self::with_detail(-32021, "INVALID_KEY_FORMAT", detail)
    }

    /// Mail could not be sent (-32030).
    pub fn delivery_failed() -> Self {
        Self::bare(-32030, "DELIVERY_FAILED")
    }
}

impl From<EngineError> for RpcError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(what) => RpcError::not_found(what),
            EngineError::InvalidSession => RpcError::invalid_session(),
            EngineError::Disabled => RpcError::account_disabled(),
            EngineError::DuplicateIdentity => RpcError::duplicate_identity(),
            EngineError::NoRecipientKeys => RpcError::no_recipient_keys(),
            EngineError::InvalidKeyFormat(detail) => RpcError::invalid_key_format(&detail),
            EngineError::InvalidEmail | EngineError::EmptyMessage => {
                RpcError::invalid_params(&err.to_string())
            }
            EngineError::Delivery(detail) => {
                warn!(detail = %detail, "Delivery failed");
                RpcError::delivery_failed()
            }
            EngineError::Transport(detail) => {
                error!(detail = %detail, "Request failed");
                RpcError::internal_error()
            }
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
pub(crate) async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) if request.jsonrpc != "2.0" => {
                RpcResponse::error(request.id, RpcError::invalid_request())
            }
            Ok(request) => dispatch_request(state.clone(), request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
///
/// Session-bound methods carry `session_id` and `person_id` in their
/// params; the engine checks them on every call.
pub(crate) async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();
    let params = &request.params;

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Sessions
        "request_session" => commands::session::request_session(&state, params).await,
        "confirm_session" => commands::session::confirm_session(&state, params).await,

        // Keys
        "upload_key" => commands::keys::upload_key(&state, params).await,
        "get_person_keys" => commands::keys::get_person_keys(&state, params).await,
        "remove_key" => commands::keys::remove_key(&state, params).await,
        "search_keys" => commands::keys::search_keys(&state, params).await,

        // Board
        "post_message" => commands::posts::post_message(&state, params).await,
        "list_posts" => commands::posts::list_posts(&state, params).await,
        "download_message" => commands::posts::download_message(&state, params).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}
