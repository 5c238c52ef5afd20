pub mod chat;
pub mod documents;
pub mod sessions;

pub use chat::*;
pub use documents::*;
pub use sessions::*;
