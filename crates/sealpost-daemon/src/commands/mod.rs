//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category. Handlers
//! pull typed values out of the JSON params and hand them to the engine.

pub mod keys;
pub mod posts;
pub mod session;

use sealpost_engine::Credentials;
use serde_json::Value;

use crate::rpc::RpcError;

/// A required string parameter.
pub(crate) fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str, RpcError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))
}

/// A required integer id parameter.
pub(crate) fn id_param(params: &Value, name: &str) -> Result<i64, RpcError> {
    params
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))
}

/// The `session_id`/`person_id` pair of a session-bound call.
pub(crate) fn credentials(params: &Value) -> Result<Credentials, RpcError> {
    Ok(Credentials {
        session_id: id_param(params, "session_id")?,
        person_id: id_param(params, "person_id")?,
    })
}

/// Credentials if the caller sent any. A half-filled pair is rejected.
pub(crate) fn optional_credentials(params: &Value) -> Result<Option<Credentials>, RpcError> {
    let has_session = params.get("session_id").is_some_and(|v| !v.is_null());
    let has_person = params.get("person_id").is_some_and(|v| !v.is_null());
    match (has_session, has_person) {
        (false, false) => Ok(None),
        _ => credentials(params).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credentials_parsing() {
        let creds = credentials(&json!({"session_id": 3, "person_id": 9})).expect("creds");
        assert_eq!(creds.session_id, 3);
        assert_eq!(creds.person_id, 9);

        let err = credentials(&json!({"session_id": 3})).expect_err("missing person");
        assert_eq!(err.code, -32602);
    }

    #[test]
    fn test_optional_credentials() {
        assert!(optional_credentials(&json!({})).expect("none").is_none());
        assert!(optional_credentials(&json!({"session_id": null, "person_id": null}))
            .expect("none")
            .is_none());
        assert!(optional_credentials(&json!({"session_id": 1})).is_err());
        assert!(optional_credentials(&json!({"session_id": 1, "person_id": 2}))
            .expect("some")
            .is_some());
    }
}
