//! Message board command handlers.

use std::sync::Arc;

use sealpost_types::MessageDigest;
use serde_json::{json, Value};

use super::{credentials, id_param, optional_credentials, str_param};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Post a message to a list of recipient emails.
pub async fn post_message(state: &Arc<DaemonState>, params: &Value) -> Result {
    let creds = credentials(params)?;
    let body = str_param(params, "message")?;
    let recipients: Vec<String> = match params.get("recipients") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| RpcError::invalid_params("recipients must be strings"))
            })
            .collect::<std::result::Result<_, _>>()?,
        Some(_) => return Err(RpcError::invalid_params("recipients must be a list")),
    };

    let outcome = state.engine.post_message(creds, body, &recipients)?;
    let failures: Vec<Value> = outcome
        .failures
        .iter()
        .map(|f| json!({"email": f.email, "reason": f.problem.to_string()}))
        .collect();

    Ok(json!({
        "message_id": outcome.message.id,
        "expires_at": outcome.message.expires_at,
        "recipients": outcome.recipients,
        "failures": failures,
    }))
}

/// A page of the board, personal when credentials are given.
pub async fn list_posts(state: &Arc<DaemonState>, params: &Value) -> Result {
    let creds = optional_credentials(params)?;
    let page = match params.get("page") {
        None | Some(Value::Null) => 0,
        Some(v) => v
            .as_u64()
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| RpcError::invalid_params("page must be a non-negative integer"))?,
    };

    let digests = state.engine.list_posts(creds, page)?;
    let posts: Vec<Value> = digests.iter().map(digest_json).collect();
    Ok(json!({ "page": page, "posts": posts }))
}

/// The armored body of a message, with a suggested file name.
pub async fn download_message(state: &Arc<DaemonState>, params: &Value) -> Result {
    let id = id_param(params, "message_id")?;
    let download = state.engine.fetch_message(id)?;
    Ok(json!({ "filename": download.filename, "body": download.body }))
}

fn digest_json(digest: &MessageDigest) -> Value {
    json!({
        "message_id": digest.message.id,
        "posted_at": digest.message.posted_at,
        "expires_at": digest.message.expires_at,
        "preview": digest.preview,
        "sender": { "id": digest.sender.id, "email": digest.sender.email },
        "recipients": digest
            .recipients
            .iter()
            .map(|p| json!({ "id": p.id, "email": p.email }))
            .collect::<Vec<_>>(),
        "involves_me": digest.involves_requestor,
    })
}
