//! Client configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `VTIGER_WS` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use vtiger_ws_client::config::ClientConfig;
//!
//! let config = ClientConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Talking to {}", config.service.url);
//! ```

mod credentials;
mod error;
mod service;

pub use credentials::CredentialsConfig;
pub use error::{ConfigError, ConfigValidationError};
pub use service::ServiceConfig;

use serde::Deserialize;

/// Root client configuration
///
/// Load using [`ClientConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Service endpoint (URL, entry point, timeout)
    pub service: ServiceConfig,

    /// Optional credentials for lazy login
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `VTIGER_WS` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `VTIGER_WS__SERVICE__URL=https://crm.example.com` -> `service.url`
    /// - `VTIGER_WS__CREDENTIALS__LOGIN_MODE=password` -> `credentials.login_mode`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("VTIGER_WS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load and validate in one step
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.service.validate()?;
        if let Some(credentials) = &self.credentials {
            credentials.validate()?;
        }
        Ok(())
    }
}
