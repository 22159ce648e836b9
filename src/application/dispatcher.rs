//! Operation dispatcher: attaches a valid session to every call.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::endpoint::ServiceEndpoint;
use super::session::SessionManager;
use crate::domain::foundation::{ClientError, FieldMap};
use crate::domain::query::normalize_query;
use crate::ports::{HttpMethod, OperationInvoker};

/// The only operation that may be sent without a session.
const UNAUTHENTICATED_OPERATION: &str = "getchallenge";

/// Sends arbitrary operations on behalf of the logged-in user.
#[derive(Debug)]
pub struct Dispatcher {
    endpoint: Arc<ServiceEndpoint>,
    session: Arc<SessionManager>,
}

impl Dispatcher {
    pub fn new(endpoint: Arc<ServiceEndpoint>, session: Arc<SessionManager>) -> Self {
        Self { endpoint, session }
    }

    /// Invokes `operation`, renewing the session first when needed.
    ///
    /// `sessionName` is always the current session's; a caller-supplied
    /// value is overwritten.
    ///
    /// # Errors
    ///
    /// Authentication errors from renewal, or any error of the call itself.
    pub async fn invoke(
        &self,
        operation: &str,
        mut params: FieldMap,
        method: HttpMethod,
    ) -> Result<Value, ClientError> {
        if operation.trim().is_empty() {
            return Err(ClientError::validation("operation name must not be empty"));
        }

        if operation != UNAUTHENTICATED_OPERATION {
            let session_name = self.session.ensure_valid().await?;
            params.insert("sessionName", session_name);
        }

        self.endpoint.call(operation, &params, method).await
    }

    /// Runs a query and returns its rows.
    ///
    /// The text is trimmed and terminated with exactly one `;`. A `null`
    /// result is treated as no rows.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty query
    /// - `Protocol` if the result is not a list of rows
    pub async fn query(&self, raw: &str) -> Result<Vec<Value>, ClientError> {
        let query = normalize_query(raw)?;
        tracing::debug!(query = %query, "Running query");

        let params = FieldMap::new().with("query", query);
        match self.invoke("query", params, HttpMethod::Get).await? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(ClientError::protocol(format!(
                "query result is not a list of rows: {}",
                json_kind(&other)
            ))),
        }
    }
}

#[async_trait]
impl OperationInvoker for Dispatcher {
    async fn invoke(
        &self,
        operation: &str,
        params: FieldMap,
        method: HttpMethod,
    ) -> Result<Value, ClientError> {
        Dispatcher::invoke(self, operation, params, method).await
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockReply, MockTransport};
    use crate::application::endpoint::{ServiceUrl, DEFAULT_ENDPOINT_PATH};
    use crate::domain::foundation::Timestamp;
    use crate::domain::session::Credentials;
    use serde_json::json;

    fn logged_in_transport() -> MockTransport {
        MockTransport::new()
            .on(
                "getchallenge",
                MockReply::success(json!({
                    "token": "T",
                    "expireTime": Timestamp::now().plus_seconds(300).unix_seconds()
                })),
            )
            .on("login", MockReply::success(json!({"sessionName": "SESS", "userId": "19x1"})))
    }

    fn dispatcher(transport: &MockTransport, credentials: Option<Credentials>) -> Dispatcher {
        let url = ServiceUrl::parse("http://crm", DEFAULT_ENDPOINT_PATH).unwrap();
        let endpoint = Arc::new(ServiceEndpoint::new(url, Arc::new(transport.clone())));
        let session = match credentials {
            Some(c) => SessionManager::with_credentials(endpoint.clone(), c),
            None => SessionManager::new(endpoint.clone()),
        };
        Dispatcher::new(endpoint, Arc::new(session))
    }

    #[tokio::test]
    async fn invoke_injects_session_name_over_caller_value() {
        let transport = logged_in_transport().on("retrieve", MockReply::success(json!({"id": "12x1"})));
        let dispatcher = dispatcher(&transport, Some(Credentials::access_key("admin", "K")));

        let params = FieldMap::new().with("sessionName", "forged").with("id", "12x1");
        dispatcher.invoke("retrieve", params, HttpMethod::Get).await.unwrap();

        let sent = transport.last_call_for("retrieve").unwrap();
        assert_eq!(sent.param("sessionName"), Some("SESS"));
        assert_eq!(sent.params.iter().filter(|(k, _)| k == "sessionName").count(), 1);
    }

    #[tokio::test]
    async fn first_invoke_logs_in_lazily() {
        let transport = logged_in_transport().on("listtypes", MockReply::success(json!({"types": []})));
        let dispatcher = dispatcher(&transport, Some(Credentials::access_key("admin", "K")));

        dispatcher.invoke("listtypes", FieldMap::new(), HttpMethod::Get).await.unwrap();

        assert_eq!(transport.calls_for("getchallenge"), 1);
        assert_eq!(transport.calls_for("login"), 1);
    }

    #[tokio::test]
    async fn invoke_without_any_login_fails_before_sending() {
        let transport = MockTransport::new();
        let dispatcher = dispatcher(&transport, None);

        let err = dispatcher
            .invoke("listtypes", FieldMap::new(), HttpMethod::Get)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Authentication { .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn getchallenge_needs_no_session() {
        let transport = logged_in_transport();
        let dispatcher = dispatcher(&transport, None);

        let params = FieldMap::new().with("username", "admin");
        let result = dispatcher.invoke("getchallenge", params, HttpMethod::Get).await.unwrap();

        assert_eq!(result["token"], "T");
        assert!(transport.last_call_for("getchallenge").unwrap().param("sessionName").is_none());
    }

    #[tokio::test]
    async fn empty_operation_is_rejected() {
        let transport = MockTransport::new();
        let dispatcher = dispatcher(&transport, None);

        let err = dispatcher.invoke("  ", FieldMap::new(), HttpMethod::Get).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
    }

    #[tokio::test]
    async fn query_normalizes_terminator_and_uses_get() {
        let transport = logged_in_transport().on(
            "query",
            MockReply::success(json!([{"id": "12x1", "lastname": "Doe"}])),
        );
        let dispatcher = dispatcher(&transport, Some(Credentials::access_key("admin", "K")));

        let rows = dispatcher.query("SELECT * FROM Contacts").await.unwrap();

        assert_eq!(rows.len(), 1);
        let sent = transport.last_call_for("query").unwrap();
        assert_eq!(sent.method, HttpMethod::Get);
        assert_eq!(sent.param("query"), Some("SELECT * FROM Contacts;"));
    }

    #[tokio::test]
    async fn query_with_null_or_empty_result_is_empty() {
        let transport = logged_in_transport()
            .once("query", MockReply::success(json!([])))
            .on("query", MockReply::success(Value::Null));
        let dispatcher = dispatcher(&transport, Some(Credentials::access_key("admin", "K")));

        assert!(dispatcher.query("SELECT * FROM Leads;").await.unwrap().is_empty());
        assert!(dispatcher.query("SELECT * FROM Leads;").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn query_with_object_result_is_protocol_error() {
        let transport = logged_in_transport().on("query", MockReply::success(json!({"id": "1"})));
        let dispatcher = dispatcher(&transport, Some(Credentials::access_key("admin", "K")));

        let err = dispatcher.query("SELECT * FROM Leads;").await.unwrap_err();
        assert!(matches!(err, ClientError::Protocol { .. }));
    }

    #[tokio::test]
    async fn empty_query_is_rejected_without_sending() {
        let transport = logged_in_transport();
        let dispatcher = dispatcher(&transport, Some(Credentials::access_key("admin", "K")));

        let err = dispatcher.query(" ;").await.unwrap_err();

        assert!(matches!(err, ClientError::Validation { .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn server_error_is_passed_through() {
        let transport = logged_in_transport().on("query", MockReply::failure("X", "bad"));
        let dispatcher = dispatcher(&transport, Some(Credentials::access_key("admin", "K")));

        let err = dispatcher.query("SELECT * FROM Leads;").await.unwrap_err();
        assert_eq!(err.code(), "X");
        assert_eq!(err.message(), "bad");
    }
}
