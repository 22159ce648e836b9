//! Response envelope decoding.
//!
//! Every response is either `{"success": true, "result": <any>}` or
//! `{"success": false, "error": {"code": .., "message": ..}}`. Anything else
//! is a protocol error.

use serde_json::Value;

use crate::domain::foundation::ClientError;

/// A decoded, structurally valid envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Success(Value),
    Failure { code: String, message: String },
}

impl Envelope {
    /// Parses a response body.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Protocol` for non-JSON bodies and for JSON that
    /// does not have one of the two envelope shapes.
    pub fn parse(body: &str) -> Result<Self, ClientError> {
        let document: Value = serde_json::from_str(body).map_err(|e| {
            tracing::warn!(error = %e, body_len = body.len(), "Response body is not JSON");
            ClientError::protocol(format!("response body is not valid JSON: {}", e))
        })?;
        Self::from_value(document)
    }

    /// Validates an already parsed JSON document.
    pub fn from_value(document: Value) -> Result<Self, ClientError> {
        let Value::Object(mut object) = document else {
            return Err(ClientError::protocol("envelope is not a JSON object"));
        };

        match object.get("success") {
            Some(Value::Bool(true)) => object
                .remove("result")
                .map(Envelope::Success)
                .ok_or_else(|| ClientError::protocol("successful envelope has no 'result' field")),
            Some(Value::Bool(false)) => {
                let error = object
                    .get("error")
                    .and_then(Value::as_object)
                    .ok_or_else(|| ClientError::protocol("failed envelope has no 'error' object"))?;
                let code = error
                    .get("code")
                    .and_then(scalar_text)
                    .ok_or_else(|| ClientError::protocol("envelope error has no 'code'"))?;
                let message = error
                    .get("message")
                    .and_then(scalar_text)
                    .ok_or_else(|| ClientError::protocol("envelope error has no 'message'"))?;
                Ok(Envelope::Failure { code, message })
            }
            _ => Err(ClientError::protocol(
                "envelope has no boolean 'success' field",
            )),
        }
    }

    /// Converts to the operation outcome: the result, or a server error.
    pub fn into_result(self) -> Result<Value, ClientError> {
        match self {
            Envelope::Success(result) => Ok(result),
            Envelope::Failure { code, message } => Err(ClientError::server(code, message)),
        }
    }
}

/// Error codes are strings on the wire, but some server builds send numbers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
