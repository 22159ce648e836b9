//! Web services session: credentials, challenge and session lifecycle.

mod credentials;
mod state;

pub use credentials::{challenge_digest, Credentials, LoginMode};
pub use state::{Challenge, Session, SessionState, SessionStatus, UserInfo};
