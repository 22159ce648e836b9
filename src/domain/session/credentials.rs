//! Login credentials and the challenge digest.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;

/// How the secret in [`Credentials`] is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoginMode {
    /// The secret is the user's web services access key.
    #[default]
    AccessKey,
    /// The secret is the user's password, exchanged via `login_pwd`.
    Password,
}

impl fmt::Display for LoginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoginMode::AccessKey => "access_key",
            LoginMode::Password => "password",
        };
        write!(f, "{}", s)
    }
}

/// Username plus secret. The secret never appears in `Debug` output.
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    secret: SecretString,
    mode: LoginMode,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>, mode: LoginMode) -> Self {
        Self {
            username: username.into(),
            secret: SecretString::new(secret.into()),
            mode,
        }
    }

    /// Credentials using an access key.
    pub fn access_key(username: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self::new(username, access_key, LoginMode::AccessKey)
    }

    /// Credentials using a password.
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(username, password, LoginMode::Password)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn mode(&self) -> LoginMode {
        self.mode
    }

    pub(crate) fn expose_secret(&self) -> &str {
        self.secret.expose_secret()
    }

    /// Replaces a password with the access key the service derived from it.
    ///
    /// The returned credentials are what later renewals use.
    pub(crate) fn with_derived_access_key(&self, access_key: impl Into<String>) -> Self {
        Self::access_key(self.username.clone(), access_key)
    }
}

/// Computes the `accessKey` login parameter: lowercase hex MD5 of
/// `challenge_token || access_key`.
pub fn challenge_digest(challenge_token: &str, access_key: &str) -> String {
    let mut input = String::with_capacity(challenge_token.len() + access_key.len());
    input.push_str(challenge_token);
    input.push_str(access_key);
    format!("{:x}", md5::compute(input.as_bytes()))
}
