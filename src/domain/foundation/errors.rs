//! Error types shared by every layer of the client.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::ports::TransportError;

/// Stable machine-readable category of a [`ClientError`].
///
/// Server-reported failures carry the server's own code instead, see
/// [`ClientError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    AuthenticationFailed,
    TransportError,
    ProtocolError,
    ValidationFailed,
    ModuleNotFound,
}

impl ErrorCode {
    /// Returns the wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthenticationFailed => "AUTHENTICATION_FAILED",
            ErrorCode::TransportError => "TRANSPORT_ERROR",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::ModuleNotFound => "MODULE_NOT_FOUND",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Every failure a client operation can report.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The challenge or login step failed, or produced a malformed response.
    #[error("authentication failed: {reason}")]
    Authentication {
        /// Human-readable reason.
        reason: String,
        /// The failure that caused the authentication step to fail, if any.
        #[source]
        source: Option<Box<ClientError>>,
    },

    /// Network failure below the HTTP layer (connect, DNS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// HTTP succeeded but the body is not a valid envelope.
    #[error("protocol error: {detail}")]
    Protocol { detail: String },

    /// The envelope explicitly reported a failure.
    #[error("server error [{code}]: {message}")]
    Server { code: String, message: String },

    /// A caller-supplied argument violates a precondition.
    #[error("validation failed: {detail}")]
    Validation { detail: String },

    /// The `describe` lookup returned no id prefix for the module.
    #[error("module not found: {module}")]
    ModuleNotFound { module: String },
}

impl ClientError {
    /// Creates an authentication error without an underlying cause.
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::Authentication {
            reason: reason.into(),
            source: None,
        }
    }

    /// Creates an authentication error caused by another client error.
    pub fn authentication_caused_by(reason: impl Into<String>, cause: ClientError) -> Self {
        Self::Authentication {
            reason: reason.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(detail: impl Into<String>) -> Self {
        Self::Protocol {
            detail: detail.into(),
        }
    }

    /// Creates a server error with the code and message reported by the service.
    pub fn server(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Server {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation {
            detail: detail.into(),
        }
    }

    /// Creates a module-not-found error.
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::ModuleNotFound {
            module: module.into(),
        }
    }

    /// Returns the error category, `None` for server-reported errors.
    pub fn category(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Authentication { .. } => Some(ErrorCode::AuthenticationFailed),
            ClientError::Transport(_) => Some(ErrorCode::TransportError),
            ClientError::Protocol { .. } => Some(ErrorCode::ProtocolError),
            ClientError::Server { .. } => None,
            ClientError::Validation { .. } => Some(ErrorCode::ValidationFailed),
            ClientError::ModuleNotFound { .. } => Some(ErrorCode::ModuleNotFound),
        }
    }

    /// Returns the stable code; server errors keep the server's code verbatim.
    pub fn code(&self) -> &str {
        match self {
            ClientError::Server { code, .. } => code,
            other => other.category().map_or("UNKNOWN", |c| c.as_str()),
        }
    }

    /// Returns the message part without the category prefix.
    pub fn message(&self) -> String {
        match self {
            ClientError::Authentication { reason, .. } => reason.clone(),
            ClientError::Transport(err) => err.to_string(),
            ClientError::Protocol { detail } | ClientError::Validation { detail } => {
                detail.clone()
            }
            ClientError::Server { message, .. } => message.clone(),
            ClientError::ModuleNotFound { module } => {
                format!("the following module is not installed: {}", module)
            }
        }
    }

    /// Returns true if the failure happened before any response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    /// Structured payload suitable for logging or re-serialization.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: true,
            code: self.code().to_string(),
            message: self.message(),
        }
    }

    /// Serializes the error as `{"error": true, "code": ..., "message": ...}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": true,
            "code": self.code(),
            "message": self.message(),
        })
    }
}

/// Wire shape of a client error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub error: bool,
    pub code: String,
    pub message: String,
}
