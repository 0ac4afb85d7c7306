//! Public key command handlers.

use std::sync::Arc;

use sealpost_engine::{KeySearch, KeySource};
use sealpost_types::PublicKey;
use serde_json::{json, Value};

use super::{credentials, id_param, str_param};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Attach a key to an email, from pasted armor (`public_key`) or a `url`.
pub async fn upload_key(state: &Arc<DaemonState>, params: &Value) -> Result {
    let email = str_param(params, "email")?;
    let source = match (
        params.get("public_key").and_then(|v| v.as_str()),
        params.get("url").and_then(|v| v.as_str()),
    ) {
        (Some(armored), None) => KeySource::Text {
            armored: armored.to_string(),
            filename: params
                .get("filename")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        },
        (None, Some(url)) => KeySource::Url(url.to_string()),
        _ => {
            return Err(RpcError::invalid_params(
                "exactly one of public_key or url required",
            ))
        }
    };
    let request_session = params
        .get("request_session")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let upload = state.engine.upload_key(email, source, request_session).await?;
    Ok(json!({
        "person_id": upload.person.id,
        "key_id": upload.key.as_ref().map(|k| k.id),
        "added": upload.added,
        "session_id": upload.session.as_ref().map(|s| s.session.id),
    }))
}

/// The caller's own keys.
pub async fn get_person_keys(state: &Arc<DaemonState>, params: &Value) -> Result {
    let creds = credentials(params)?;
    let keys = state.engine.person_keys(creds)?;
    Ok(json!({ "keys": keys.iter().map(key_json).collect::<Vec<_>>() }))
}

/// Delete one of the caller's keys.
pub async fn remove_key(state: &Arc<DaemonState>, params: &Value) -> Result {
    let creds = credentials(params)?;
    let key_id = id_param(params, "key_id")?;
    state.engine.remove_key(creds, key_id)?;
    Ok(json!({ "removed": true }))
}

/// Look up the keys of another email, here or in the directory.
pub async fn search_keys(state: &Arc<DaemonState>, params: &Value) -> Result {
    let creds = credentials(params)?;
    let email = str_param(params, "email")?;

    let found = state.engine.search_keys(creds, email).await?;
    let value = match found {
        KeySearch::Local { person, keys } => json!({
            "found": "local",
            "person_id": person.id,
            "keys": keys.iter().map(|k| k.armored.as_str()).collect::<Vec<_>>(),
        }),
        KeySearch::Directory(candidates) => json!({
            "found": "directory",
            "keys": candidates.iter().map(|k| k.armored.as_str()).collect::<Vec<_>>(),
        }),
        KeySearch::Unknown => json!({ "found": "none", "keys": [] }),
    };
    Ok(value)
}

fn key_json(key: &PublicKey) -> Value {
    json!({
        "id": key.id,
        "nickname": key.nickname,
        "source": key.source,
        "added_at": key.added_at,
        "key": key.armored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_key, signed_in, test_state};

    #[tokio::test]
    async fn test_upload_and_list() {
        let (_dir, state) = test_state();
        let uploaded = upload_key(
            &state,
            &json!({
                "email": "carol@example.org",
                "public_key": sample_key(7),
                "filename": "carol.asc",
            }),
        )
        .await
        .expect("upload");
        assert_eq!(uploaded["added"], true);
        assert!(uploaded["session_id"].is_null());

        let alice = signed_in(&state, "alice@example.org");
        let found = search_keys(
            &state,
            &json!({
                "session_id": alice.session_id,
                "person_id": alice.person_id,
                "email": "carol@example.org",
            }),
        )
        .await
        .expect("search");
        assert_eq!(found["found"], "local");
        assert_eq!(found["keys"], json!([sample_key(7).trim()]));

        let mine = get_person_keys(
            &state,
            &json!({"session_id": alice.session_id, "person_id": alice.person_id}),
        )
        .await
        .expect("keys");
        let keys = mine["keys"].as_array().expect("list");
        assert_eq!(keys.len(), 1);

        let key_id = keys[0]["id"].as_i64().expect("id");
        remove_key(
            &state,
            &json!({"session_id": alice.session_id, "person_id": alice.person_id, "key_id": key_id}),
        )
        .await
        .expect("remove");
    }

    #[tokio::test]
    async fn test_upload_needs_one_source() {
        let (_dir, state) = test_state();
        let err = upload_key(&state, &json!({"email": "carol@example.org"}))
            .await
            .expect_err("no source");
        assert_eq!(err.code, -32602);

        let err = upload_key(
            &state,
            &json!({"email": "carol@example.org", "public_key": "garbage"}),
        )
        .await
        .expect_err("bad key");
        assert_eq!(err.code, -32021);
    }

    #[tokio::test]
    async fn test_search_unknown_with_directory_off() {
        let (_dir, state) = test_state();
        let alice = signed_in(&state, "alice@example.org");
        let found = search_keys(
            &state,
            &json!({
                "session_id": alice.session_id,
                "person_id": alice.person_id,
                "email": "nobody@example.org",
            }),
        )
        .await
        .expect("search");
        assert_eq!(found["found"], "none");
    }
}
