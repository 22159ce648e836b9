//! Result payloads of the authentication operations.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::foundation::{ClientError, Timestamp};
use crate::domain::session::Challenge;

/// Unix time that some server builds send as a number, others as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum UnixTime {
    Number(i64),
    Text(String),
}

impl UnixTime {
    fn to_timestamp(&self) -> Option<Timestamp> {
        let seconds = match self {
            UnixTime::Number(n) => *n,
            UnixTime::Text(s) => s.trim().parse().ok()?,
        };
        Timestamp::from_unix_seconds(seconds)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeResult {
    token: Option<String>,
    server_time: Option<UnixTime>,
    expire_time: Option<UnixTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResult {
    session_name: Option<String>,
    user_id: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    vtiger_version: Option<String>,
}

/// Fields of a successful login the session is built from.
#[derive(Debug, Clone)]
pub(crate) struct LoginGrant {
    pub session_name: String,
    pub user_id: String,
    pub api_version: String,
    pub vtiger_version: String,
}

/// Parses a `getchallenge` result.
pub(crate) fn parse_challenge(username: &str, result: Value) -> Result<Challenge, ClientError> {
    let parsed: ChallengeResult = serde_json::from_value(result)
        .map_err(|e| ClientError::authentication(format!("malformed challenge response: {}", e)))?;

    let token = parsed
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ClientError::authentication("challenge response has no token"))?;
    let expires_at = parsed
        .expire_time
        .as_ref()
        .and_then(UnixTime::to_timestamp)
        .ok_or_else(|| ClientError::authentication("challenge response has no valid expireTime"))?;
    let server_time = parsed.server_time.as_ref().and_then(UnixTime::to_timestamp);

    Ok(Challenge::new(username, token, server_time, expires_at))
}

/// Parses a `login` result.
pub(crate) fn parse_login(result: Value) -> Result<LoginGrant, ClientError> {
    let parsed: LoginResult = serde_json::from_value(result)
        .map_err(|e| ClientError::authentication(format!("malformed login response: {}", e)))?;

    let session_name = parsed
        .session_name
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ClientError::authentication("login response has no sessionName"))?;
    let user_id = parsed
        .user_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ClientError::authentication("login response has no userId"))?;

    Ok(LoginGrant {
        session_name,
        user_id,
        api_version: parsed.version.unwrap_or_default(),
        vtiger_version: parsed.vtiger_version.unwrap_or_default(),
    })
}

/// Extracts the access key from a `login_pwd` result.
///
/// Servers answer either `{"accesskey": ".."}` or a one-element array.
pub(crate) fn parse_access_key(result: &Value) -> Result<String, ClientError> {
    let key = match result {
        Value::Object(map) => map.get("accesskey").and_then(Value::as_str),
        Value::Array(items) if items.len() == 1 => items[0].as_str(),
        Value::String(s) => Some(s.as_str()),
        _ => None,
    };

    key.filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ClientError::authentication("login_pwd response has no access key"))
}
