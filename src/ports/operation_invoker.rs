//! Port for invoking authenticated web service operations.
//!
//! Implemented by the dispatcher; consumed by the typed-id resolver and by
//! any higher-level record helpers.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::foundation::{ClientError, FieldMap};
use crate::ports::HttpMethod;

#[async_trait]
pub trait OperationInvoker: Send + Sync {
    /// Invokes `operation` with `params` and returns the envelope's `result`.
    async fn invoke(
        &self,
        operation: &str,
        params: FieldMap,
        method: HttpMethod,
    ) -> Result<Value, ClientError>;
}
