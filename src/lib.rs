//! vtiger-ws-client - Client for the vtiger CRM web services API
//!
//! Handles the challenge/login handshake, keeps the session alive across
//! expiry, dispatches arbitrary operations with the session attached, builds
//! restricted queries and resolves numeric record ids to typed ids.
//!
//! The crate follows a ports-and-adapters layout:
//!
//! - `domain` - errors, values, session state, query building, typed ids
//! - `ports` - `HttpTransport` and `OperationInvoker` traits
//! - `adapters` - reqwest and mock transports
//! - `application` - session manager, dispatcher, resolver, `WsClient`
//! - `config` - environment-based configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{ServiceUrl, WsClient};
pub use domain::foundation::{ClientError, ErrorCode, FieldMap, FieldValue};
pub use domain::query::{build_query, QueryBuilder, QuerySpec};
pub use domain::session::{Credentials, LoginMode, SessionStatus, UserInfo};
pub use domain::typed_id::{extract_numeric_id, TypedId, UNRESOLVABLE_ID};
pub use ports::HttpMethod;

/// Version of this client library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
