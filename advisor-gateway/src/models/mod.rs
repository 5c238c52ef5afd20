//! Domain models for the advisor gateway.

pub mod session;

pub use session::{generate_session_id, session_key, Role, Session, SessionMessage};
