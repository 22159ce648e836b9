//! The web services endpoint: URL normalization and the session-less call
//! primitive every operation goes through.

use reqwest::Url;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::envelope::Envelope;
use crate::domain::foundation::{ClientError, FieldMap};
use crate::ports::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

/// Default path of the web services entry point below the CRM base URL.
pub const DEFAULT_ENDPOINT_PATH: &str = "webservice.php";

/// Fully qualified URL of the web services entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrl(Url);

impl ServiceUrl {
    /// Normalizes a CRM base URL and appends the endpoint path.
    ///
    /// `crm.example.com` and `http://crm.example.com` both become
    /// `http://crm.example.com/webservice.php`; an existing base path is kept.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an empty or unparseable URL.
    pub fn parse(raw: &str, endpoint_path: &str) -> Result<Self, ClientError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ClientError::validation("service URL must not be empty"));
        }

        let lower = trimmed.to_ascii_lowercase();
        let mut base = if lower.starts_with("http://") || lower.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };
        if !base.ends_with('/') {
            base.push('/');
        }

        let base = Url::parse(&base)
            .map_err(|e| ClientError::validation(format!("invalid service URL '{}': {}", trimmed, e)))?;
        if base.host_str().map_or(true, str::is_empty) {
            return Err(ClientError::validation(format!(
                "service URL '{}' has no host",
                trimmed
            )));
        }

        let path = endpoint_path.trim().trim_start_matches('/');
        let path = if path.is_empty() { DEFAULT_ENDPOINT_PATH } else { path };
        let url = base
            .join(path)
            .map_err(|e| ClientError::validation(format!("invalid endpoint path '{}': {}", path, e)))?;

        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sends one operation to the service and decodes the envelope.
///
/// Knows nothing about sessions; the session manager uses it directly for
/// `getchallenge`, `login` and `login_pwd`, the dispatcher for everything
/// else after injecting `sessionName`.
pub struct ServiceEndpoint {
    transport: Arc<dyn HttpTransport>,
    url: ServiceUrl,
    request_timeout: Option<Duration>,
}

impl ServiceEndpoint {
    pub fn new(url: ServiceUrl, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            url,
            request_timeout: None,
        }
    }

    /// Applies a timeout to every request, overriding the transport default.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn url(&self) -> &ServiceUrl {
        &self.url
    }

    /// Performs `operation` with `params` and returns the envelope's result.
    ///
    /// # Errors
    ///
    /// - `Validation` if a parameter cannot be rendered or is named `operation`
    /// - `Transport` if no HTTP response was obtained
    /// - `Protocol` if the body is not a valid envelope
    /// - `Server` if the envelope reports a failure
    pub async fn call(
        &self,
        operation: &str,
        params: &FieldMap,
        method: HttpMethod,
    ) -> Result<Value, ClientError> {
        let request = self.build_request(operation, params, method)?;

        tracing::debug!(
            operation = %operation,
            method = %method,
            param_count = request.params.len(),
            "Sending web service request"
        );

        let response = self.transport.send(request).await.map_err(|e| {
            tracing::warn!(operation = %operation, error = %e, "Transport failure");
            ClientError::from(e)
        })?;

        decode_response(operation, response)
    }

    fn build_request(
        &self,
        operation: &str,
        params: &FieldMap,
        method: HttpMethod,
    ) -> Result<HttpRequest, ClientError> {
        let mut request =
            HttpRequest::new(method, self.url.as_str()).with_param("operation", operation);

        for (name, value) in params.iter() {
            if name == "operation" {
                return Err(ClientError::validation(
                    "parameter name 'operation' is reserved",
                ));
            }
            let literal = value.to_literal().map_err(|e| {
                ClientError::validation(format!("cannot encode parameter '{}': {}", name, e))
            })?;
            request = request.with_param(name, literal);
        }

        if let Some(timeout) = self.request_timeout {
            request = request.with_timeout(timeout);
        }
        Ok(request)
    }
}

impl fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("url", &self.url)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Non-2xx responses still carry a failure envelope on some servers; that
/// envelope wins. Otherwise the status itself is the protocol error.
fn decode_response(operation: &str, response: HttpResponse) -> Result<Value, ClientError> {
    let envelope = Envelope::parse(&response.body);

    if response.is_success() {
        let result = envelope.and_then(Envelope::into_result);
        if let Err(ClientError::Server { code, message }) = &result {
            tracing::debug!(operation = %operation, code = %code, message = %message, "Server reported failure");
        }
        return result;
    }

    tracing::warn!(operation = %operation, status = response.status, "Non-success HTTP status");
    match envelope {
        Ok(Envelope::Failure { code, message }) => Err(ClientError::server(code, message)),
        _ => Err(ClientError::protocol(format!(
            "unexpected HTTP status {} for operation '{}'",
            response.status, operation
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockReply, MockTransport};
    use crate::ports::TransportError;
    use serde_json::json;

    fn endpoint(transport: &MockTransport) -> ServiceEndpoint {
        let url = ServiceUrl::parse("crm.example.com", DEFAULT_ENDPOINT_PATH).unwrap();
        ServiceEndpoint::new(url, Arc::new(transport.clone()))
    }

    // ════════════════════════════════════════════════════════════════════
    // ServiceUrl
    // ════════════════════════════════════════════════════════════════════

    #[test]
    fn bare_host_gets_scheme_and_path() {
        let url = ServiceUrl::parse("crm.example.com", "webservice.php").unwrap();
        assert_eq!(url.as_str(), "http://crm.example.com/webservice.php");
    }

    #[test]
    fn base_path_is_preserved() {
        let url = ServiceUrl::parse("https://example.com/vtigercrm", "webservice.php").unwrap();
        assert_eq!(url.as_str(), "https://example.com/vtigercrm/webservice.php");

        let url = ServiceUrl::parse("https://example.com/vtigercrm/", "/webservice.php").unwrap();
        assert_eq!(url.as_str(), "https://example.com/vtigercrm/webservice.php");
    }

    #[test]
    fn blank_endpoint_path_uses_default() {
        let url = ServiceUrl::parse("http://crm", "").unwrap();
        assert_eq!(url.as_str(), "http://crm/webservice.php");
    }

    #[test]
    fn empty_url_is_rejected() {
        let err = ServiceUrl::parse("   ", DEFAULT_ENDPOINT_PATH).unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
    }

    #[test]
    fn malformed_url_is_rejected() {
        let err = ServiceUrl::parse("http://exa mple.com", DEFAULT_ENDPOINT_PATH).unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
    }

    // ════════════════════════════════════════════════════════════════════
    // call
    // ════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn call_sends_operation_first_and_renders_params() {
        let transport = MockTransport::new().on("retrieve", MockReply::success(json!({"id": "12x5"})));
        let params = FieldMap::new().with("id", "12x5").with("active", true).with("notes", Option::<String>::None);

        let result = endpoint(&transport)
            .call("retrieve", &params, HttpMethod::Get)
            .await
            .unwrap();

        assert_eq!(result, json!({"id": "12x5"}));
        let sent = transport.last_call_for("retrieve").unwrap();
        assert_eq!(sent.url, "http://crm.example.com/webservice.php");
        assert_eq!(sent.params[0], ("operation".to_string(), "retrieve".to_string()));
        assert_eq!(sent.param("active"), Some("1"));
        assert_eq!(sent.param("notes"), Some(""));
    }

    #[tokio::test]
    async fn nested_values_are_sent_as_json() {
        let transport = MockTransport::new().on("create", MockReply::success(json!({})));
        let element = FieldMap::new().with("lastname", "Doe").with("age", 42);
        let params = FieldMap::new().with("elementType", "Contacts").with("element", element);

        endpoint(&transport)
            .call("create", &params, HttpMethod::Post)
            .await
            .unwrap();

        let sent = transport.last_call_for("create").unwrap();
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.param("element"), Some(r#"{"lastname":"Doe","age":42}"#));
    }

    #[tokio::test]
    async fn reserved_operation_param_is_rejected_without_sending() {
        let transport = MockTransport::new();
        let params = FieldMap::new().with("operation", "delete");

        let err = endpoint(&transport)
            .call("query", &params, HttpMethod::Get)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Validation { .. }));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn request_timeout_is_attached() {
        let transport = MockTransport::new().on("listtypes", MockReply::success(json!({"types": []})));
        let endpoint = endpoint(&transport).with_request_timeout(Duration::from_secs(5));

        endpoint.call("listtypes", &FieldMap::new(), HttpMethod::Get).await.unwrap();

        let sent = transport.last_call_for("listtypes").unwrap();
        assert_eq!(sent.timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn failure_envelope_becomes_server_error() {
        let transport = MockTransport::new().on("query", MockReply::failure("X", "bad"));

        let err = endpoint(&transport)
            .call("query", &FieldMap::new(), HttpMethod::Get)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "X");
        assert_eq!(err.message(), "bad");
    }

    #[tokio::test]
    async fn transport_failure_is_propagated() {
        let transport = MockTransport::new().on(
            "query",
            MockReply::transport(TransportError::timeout("deadline elapsed")),
        );

        let err = endpoint(&transport)
            .call("query", &FieldMap::new(), HttpMethod::Get)
            .await
            .unwrap_err();

        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn non_success_status_with_failure_envelope_is_server_error() {
        let transport = MockTransport::new().on(
            "query",
            MockReply::raw(500, r#"{"success":false,"error":{"code":"DATABASE_QUERY_ERROR","message":"boom"}}"#),
        );

        let err = endpoint(&transport)
            .call("query", &FieldMap::new(), HttpMethod::Get)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "DATABASE_QUERY_ERROR");
    }

    #[tokio::test]
    async fn non_success_status_without_envelope_is_protocol_error() {
        let transport = MockTransport::new().on("query", MockReply::raw(502, "Bad Gateway"));

        let err = endpoint(&transport)
            .call("query", &FieldMap::new(), HttpMethod::Get)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Protocol { ref detail } if detail.contains("502")));
    }

    #[tokio::test]
    async fn non_success_status_with_success_envelope_is_protocol_error() {
        let transport = MockTransport::new().on(
            "query",
            MockReply::raw(404, r#"{"success":true,"result":[]}"#),
        );

        let err = endpoint(&transport)
            .call("query", &FieldMap::new(), HttpMethod::Get)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Protocol { .. }));
    }
}
