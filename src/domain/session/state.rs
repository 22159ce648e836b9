//! Session lifecycle: status enum, challenge and active-session data.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{StateMachine, Timestamp};

/// Lifecycle status of the web services session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    Challenged,
    Active,
    Expired,
}

impl StateMachine for SessionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionStatus::*;
        matches!(
            (self, target),
            (Unauthenticated, Challenged)
                | (Challenged, Active)
                | (Challenged, Unauthenticated)
                | (Challenged, Expired)
                | (Active, Expired)
                | (Active, Challenged)
                | (Expired, Challenged)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionStatus::*;
        match self {
            Unauthenticated => vec![Challenged],
            Challenged => vec![Active, Unauthenticated, Expired],
            Active => vec![Expired, Challenged],
            Expired => vec![Challenged],
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Unauthenticated => "Unauthenticated",
            SessionStatus::Challenged => "Challenged",
            SessionStatus::Active => "Active",
            SessionStatus::Expired => "Expired",
        };
        write!(f, "{}", s)
    }
}

/// One-time challenge issued by `getchallenge`.
///
/// Consumed by exactly one login attempt.
#[derive(Debug, Clone)]
pub struct Challenge {
    username: String,
    token: SecretString,
    server_time: Option<Timestamp>,
    expires_at: Timestamp,
}

impl Challenge {
    pub fn new(
        username: impl Into<String>,
        token: impl Into<String>,
        server_time: Option<Timestamp>,
        expires_at: Timestamp,
    ) -> Self {
        Self {
            username: username.into(),
            token: SecretString::new(token.into()),
            server_time,
            expires_at,
        }
    }

    /// The user the challenge was issued for.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// True while the challenge can still be answered by a login.
    pub fn is_usable_for(&self, username: &str) -> bool {
        self.username == username && !self.expires_at.has_passed()
    }

    pub(crate) fn token(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn server_time(&self) -> Option<Timestamp> {
        self.server_time
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }
}

/// Data returned by a successful `login`.
#[derive(Debug, Clone)]
pub struct Session {
    session_name: SecretString,
    user_id: String,
    username: String,
    api_version: String,
    vtiger_version: String,
    expires_at: Timestamp,
}

impl Session {
    pub fn new(
        session_name: impl Into<String>,
        user_id: impl Into<String>,
        username: impl Into<String>,
        api_version: impl Into<String>,
        vtiger_version: impl Into<String>,
        expires_at: Timestamp,
    ) -> Self {
        Self {
            session_name: SecretString::new(session_name.into()),
            user_id: user_id.into(),
            username: username.into(),
            api_version: api_version.into(),
            vtiger_version: vtiger_version.into(),
            expires_at,
        }
    }

    pub(crate) fn session_name(&self) -> &str {
        self.session_name.expose_secret()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn vtiger_version(&self) -> &str {
        &self.vtiger_version
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    /// True once the expiry derived from the challenge has been reached.
    pub fn is_expired(&self) -> bool {
        self.expires_at.has_passed()
    }
}

/// Current state of the session together with the data valid in it.
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Challenged(Challenge),
    Active(Session),
    Expired(Session),
}

impl SessionState {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionState::Unauthenticated => SessionStatus::Unauthenticated,
            SessionState::Challenged(_) => SessionStatus::Challenged,
            SessionState::Active(_) => SessionStatus::Active,
            SessionState::Expired(_) => SessionStatus::Expired,
        }
    }

    /// Session data, present in `Active` and `Expired`.
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Active(s) | SessionState::Expired(s) => Some(s),
            _ => None,
        }
    }
}

/// Public view of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub user_id: String,
    pub username: String,
}

impl From<&Session> for UserInfo {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            username: session.username.clone(),
        }
    }
}
