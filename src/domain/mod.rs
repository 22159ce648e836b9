//! Domain layer containing the client's pure types and rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (errors, field maps, timestamps, state machine)
//! - `session` - Credentials, challenge digest and session lifecycle
//! - `query` - Restricted query language builder
//! - `typed_id` - Module-prefixed record identifiers

pub mod foundation;
pub mod query;
pub mod session;
pub mod typed_id;
