pub mod documents;
pub mod guardrails;
pub mod metrics;
pub mod prompt;
pub mod providers;
pub mod sessions;

pub use guardrails::{GuardOutcome, Guardrails};
pub use prompt::{Prompt, PromptBuilder};
pub use sessions::SessionStore;
