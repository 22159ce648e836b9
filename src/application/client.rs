//! `WsClient`: the public entry point tying endpoint, session, dispatcher
//! and resolver together.

use serde_json::Value;
use std::sync::Arc;

use super::dispatcher::Dispatcher;
use super::endpoint::{ServiceEndpoint, ServiceUrl, DEFAULT_ENDPOINT_PATH};
use super::session::SessionManager;
use super::typed_id_resolver::TypedIdResolver;
use crate::adapters::http::{ReqwestTransport, DEFAULT_TIMEOUT};
use crate::config::ClientConfig;
use crate::domain::foundation::{ClientError, FieldMap};
use crate::domain::query::{build_query, QuerySpec};
use crate::domain::session::{Credentials, SessionStatus, UserInfo};
use crate::domain::typed_id::TypedId;
use crate::ports::{HttpMethod, HttpTransport};

/// Client for one CRM web services endpoint.
///
/// Cheap to share behind an `Arc`; all methods take `&self` and may be
/// called concurrently.
///
/// # Example
///
/// ```no_run
/// # async fn run() -> Result<(), vtiger_ws_client::ClientError> {
/// use vtiger_ws_client::WsClient;
///
/// let client = WsClient::new("https://crm.example.com")?;
/// client.login("admin", "ACCESS_KEY").await?;
/// let rows = client.query("SELECT id, lastname FROM Contacts LIMIT 5").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WsClient {
    endpoint: Arc<ServiceEndpoint>,
    session: Arc<SessionManager>,
    dispatcher: Arc<Dispatcher>,
    resolver: TypedIdResolver,
}

impl WsClient {
    /// Creates a client for `url` using the reqwest transport.
    ///
    /// # Errors
    ///
    /// `Validation` for an unusable URL, `Transport` if the HTTP client
    /// cannot be built.
    pub fn new(url: &str) -> Result<Self, ClientError> {
        let url = ServiceUrl::parse(url, DEFAULT_ENDPOINT_PATH)?;
        let transport = ReqwestTransport::new(DEFAULT_TIMEOUT)?;
        Ok(Self::with_transport(url, Arc::new(transport)))
    }

    /// Creates a client over any transport.
    pub fn with_transport(url: ServiceUrl, transport: Arc<dyn HttpTransport>) -> Self {
        let endpoint = Arc::new(ServiceEndpoint::new(url, transport));
        let session = Arc::new(SessionManager::new(endpoint.clone()));
        Self::assemble(endpoint, session)
    }

    /// Creates a client over any transport that logs in with `credentials`
    /// on first use.
    pub fn with_credentials(
        url: ServiceUrl,
        transport: Arc<dyn HttpTransport>,
        credentials: Credentials,
    ) -> Self {
        let endpoint = Arc::new(ServiceEndpoint::new(url, transport));
        let session = Arc::new(SessionManager::with_credentials(endpoint.clone(), credentials));
        Self::assemble(endpoint, session)
    }

    /// Builds a client from validated configuration.
    ///
    /// # Errors
    ///
    /// `Validation` if the configuration is invalid, `Transport` if the
    /// HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        config
            .validate()
            .map_err(|e| ClientError::validation(e.to_string()))?;

        let url = ServiceUrl::parse(&config.service.url, &config.service.endpoint_path)?;
        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new(config.service.timeout())?);

        tracing::info!(
            url = %url,
            timeout_secs = config.service.timeout_secs,
            has_credentials = config.credentials.is_some(),
            "Web services client configured"
        );

        Ok(match &config.credentials {
            Some(c) => Self::with_credentials(url, transport, c.to_credentials()),
            None => Self::with_transport(url, transport),
        })
    }

    fn assemble(endpoint: Arc<ServiceEndpoint>, session: Arc<SessionManager>) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(endpoint.clone(), session.clone()));
        let resolver = TypedIdResolver::new(dispatcher.clone());
        Self {
            endpoint,
            session,
            dispatcher,
            resolver,
        }
    }

    pub fn service_url(&self) -> &ServiceUrl {
        self.endpoint.url()
    }

    // ════════════════════════════════════════════════════════════════════
    // Session
    // ════════════════════════════════════════════════════════════════════

    /// Requests a challenge for `username` without logging in.
    pub async fn challenge(&self, username: &str) -> Result<(), ClientError> {
        self.session.challenge(username).await
    }

    /// Logs in with an access key.
    pub async fn login(&self, username: &str, access_key: &str) -> Result<UserInfo, ClientError> {
        self.session
            .login(Credentials::access_key(username, access_key))
            .await
    }

    /// Logs in with a password, exchanging it for the access key first.
    pub async fn login_with_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserInfo, ClientError> {
        self.session.login(Credentials::password(username, password)).await
    }

    /// Makes sure a valid session exists, renewing it if needed.
    pub async fn ensure_session(&self) -> Result<(), ClientError> {
        self.session.ensure_valid().await.map(|_| ())
    }

    pub async fn status(&self) -> SessionStatus {
        self.session.status().await
    }

    pub async fn current_user(&self) -> Option<UserInfo> {
        self.session.current_user().await
    }

    pub async fn api_version(&self) -> Option<String> {
        self.session.api_version().await
    }

    pub async fn vtiger_version(&self) -> Option<String> {
        self.session.vtiger_version().await
    }

    // ════════════════════════════════════════════════════════════════════
    // Operations
    // ════════════════════════════════════════════════════════════════════

    /// Invokes any operation with the current session.
    pub async fn invoke(
        &self,
        operation: &str,
        params: FieldMap,
        method: HttpMethod,
    ) -> Result<Value, ClientError> {
        self.dispatcher.invoke(operation, params, method).await
    }

    /// Runs a query and returns its rows.
    pub async fn query(&self, query: &str) -> Result<Vec<Value>, ClientError> {
        self.dispatcher.query(query).await
    }

    /// Builds query text from a structured description; no network call.
    pub fn build_query(spec: &QuerySpec) -> Result<String, ClientError> {
        build_query(spec)
    }

    /// Builds and runs a structured query.
    pub async fn query_with(&self, spec: &QuerySpec) -> Result<Vec<Value>, ClientError> {
        let query = build_query(spec)?;
        self.dispatcher.query(&query).await
    }

    /// Turns a bare numeric id into `<prefix>x<id>` for `module`.
    pub async fn resolve_typed_id(&self, module: &str, id: &str) -> Result<TypedId, ClientError> {
        self.resolver.resolve(module, id).await
    }

    /// Names of the modules the user may access.
    ///
    /// # Errors
    ///
    /// `Protocol` if the result has no `types` list.
    pub async fn list_types(&self) -> Result<Vec<String>, ClientError> {
        let result = self
            .dispatcher
            .invoke("listtypes", FieldMap::new(), HttpMethod::Get)
            .await?;

        result
            .get("types")
            .and_then(Value::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .ok_or_else(|| ClientError::protocol("listtypes result has no 'types' list"))
    }

    /// Field metadata of `module`. Also primes the id prefix cache.
    pub async fn describe(&self, module: &str) -> Result<Value, ClientError> {
        let params = FieldMap::new().with("elementType", module);
        let description = self
            .dispatcher
            .invoke("describe", params, HttpMethod::Get)
            .await?;

        self.resolver.remember_described(module, &description);
        Ok(description)
    }
}
