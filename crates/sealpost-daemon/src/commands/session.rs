//! Session command handlers.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use super::str_param;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Mail a fresh session code to the owner of `email`.
///
/// The code itself never appears in the response; it only travels inside
/// the encrypted attachment.
pub async fn request_session(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let created = state.engine.request_session(email).await?;

    info!(session_id = created.session.id, "Session requested");
    Ok(json!({
        "session_id": created.session.id,
        "person_id": created.session.person_id,
        "expires_at": created.session.expires_at,
    }))
}

/// Confirm a decrypted session code.
pub async fn confirm_session(state: &Arc<DaemonState>, params: &Value) -> Result {
    let code = str_param(params, "code")?;
    let confirmed = state.engine.confirm_session(code)?;

    Ok(json!({
        "session_id": confirmed.session.id,
        "person_id": confirmed.person.id,
        "email": confirmed.person.email,
        "expires_at": confirmed.session.expires_at,
    }))
}
