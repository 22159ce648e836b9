//! Application layer - Orchestrates sessions and operations over the ports.
//!
//! - `endpoint` - service URL and the session-less call primitive
//! - `envelope` - response envelope decoding
//! - `session` - challenge/login lifecycle with single-flight renewal
//! - `dispatcher` - session-authenticated operation calls and queries
//! - `typed_id_resolver` - numeric to typed id conversion with prefix cache
//! - `client` - the `WsClient` facade

mod client;
mod dispatcher;
mod endpoint;
mod envelope;
mod session;
mod typed_id_resolver;

pub use client::WsClient;
pub use dispatcher::Dispatcher;
pub use endpoint::{ServiceEndpoint, ServiceUrl, DEFAULT_ENDPOINT_PATH};
pub use envelope::Envelope;
pub use session::SessionManager;
pub use typed_id_resolver::TypedIdResolver;
