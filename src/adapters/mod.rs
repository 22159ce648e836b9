//! Adapters - Implementations of port interfaces.
//!
//! - `http` - `HttpTransport` implementations (reqwest, mock)

pub mod http;

pub use http::{MockReply, MockTransport, ReqwestTransport};
