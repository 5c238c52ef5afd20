//! HTTP handlers for advisor-gateway.

pub mod chat;
pub mod documents;
pub mod health;
pub mod metrics;
pub mod sessions;

pub use chat::*;
pub use documents::*;
pub use health::*;
pub use metrics::*;
pub use sessions::*;
