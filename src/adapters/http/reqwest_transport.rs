//! reqwest-backed implementation of the `HttpTransport` port.
//!
//! GET requests carry their parameters in the query string, POST requests
//! as an `application/x-www-form-urlencoded` body.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::domain::foundation::ClientError;
use crate::ports::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Default timeout applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport using a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with the given default timeout.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the TLS backend cannot be
    /// initialized.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vtiger-ws-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::from)?;
        Ok(Self { client })
    }

    /// Wraps an existing client, e.g. one configured with a proxy.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::connect(err.to_string())
        } else {
            TransportError::new(crate::ports::TransportErrorKind::Other, err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url).query(&request.params),
            HttpMethod::Post => self.client.post(&request.url).form(&request.params),
        };
        let builder = match request.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                error = %e,
                "HTTP request failed"
            );
            TransportError::from(e)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(TransportError::from)?;

        Ok(HttpResponse { status, body })
    }
}
