//! Session management for the web services client.

mod manager;
mod wire;

pub use manager::SessionManager;
