//! Login credentials configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ConfigValidationError;
use crate::domain::session::{Credentials, LoginMode};

/// Credentials the client logs in with lazily on first use
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    pub username: String,

    /// Access key or password, depending on `login_mode`
    pub secret: SecretString,

    #[serde(default)]
    pub login_mode: LoginMode,
}

impl CredentialsConfig {
    pub fn to_credentials(&self) -> Credentials {
        Credentials::new(
            self.username.clone(),
            self.secret.expose_secret().clone(),
            self.login_mode,
        )
    }

    /// Validate credentials configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.username.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired("CREDENTIALS__USERNAME"));
        }
        if self.secret.expose_secret().is_empty() {
            return Err(ConfigValidationError::MissingRequired("CREDENTIALS__SECRET"));
        }
        Ok(())
    }
}
