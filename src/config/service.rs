//! Service endpoint configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ConfigValidationError;
use crate::application::{ServiceUrl, DEFAULT_ENDPOINT_PATH};

/// Where the CRM lives and how long to wait for it
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// CRM base URL; a missing scheme defaults to `http://`
    pub url: String,

    /// Entry point below the base URL
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Normalized URL of the web services entry point
    pub fn service_url(&self) -> Result<ServiceUrl, ConfigValidationError> {
        ServiceUrl::parse(&self.url, &self.endpoint_path)
            .map_err(|e| ConfigValidationError::InvalidServiceUrl(e.message()))
    }

    /// Validate service configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.url.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired("SERVICE__URL"));
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ConfigValidationError::InvalidTimeout);
        }
        self.service_url()?;
        Ok(())
    }
}

fn default_endpoint_path() -> String {
    DEFAULT_ENDPOINT_PATH.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
