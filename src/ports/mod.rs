//! Ports - Interfaces for external dependencies.
//!
//! - `HttpTransport` - sends one HTTP request and returns status and body
//! - `OperationInvoker` - invokes a session-authenticated service operation

mod http_transport;
mod operation_invoker;

pub use http_transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError, TransportErrorKind,
};
pub use operation_invoker::OperationInvoker;
