//! Foundation module - Shared domain primitives.
//!
//! Contains the error model, ordered field maps, timestamps and the
//! state machine trait used by the rest of the client.

mod errors;
mod state_machine;
mod timestamp;
mod values;

pub use errors::{ClientError, ErrorCode, ErrorPayload};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
pub use values::{FieldMap, FieldValue};
