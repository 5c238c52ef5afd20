//! Pre-provider guards. Each guard either lets a query through or answers it
//! with a canned refusal so the provider is never called.

use crate::config::GuardrailConfig;

/// Result of running a query through the guards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Block {
        /// Name of the guard that refused, used as a metrics label.
        guard: &'static str,
        message: String,
    },
}

/// Rough token estimate: four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

#[derive(Debug, Clone)]
pub struct TokenGuard {
    max_query_tokens: usize,
    max_document_tokens: usize,
}

impl TokenGuard {
    pub fn new(max_query_tokens: usize, max_document_tokens: usize) -> Self {
        Self {
            max_query_tokens,
            max_document_tokens,
        }
    }

    pub fn check(&self, text: &str, is_document: bool) -> GuardOutcome {
        let (limit, source) = if is_document {
            (self.max_document_tokens, "document upload")
        } else {
            (self.max_query_tokens, "direct message")
        };

        if estimate_tokens(text) > limit {
            return GuardOutcome::Block {
                guard: "token",
                message: format!(
                    "I cannot process this {} as it exceeds the token limit of {}. \
                     Please try a shorter input.",
                    source, limit
                ),
            };
        }
        GuardOutcome::Allow
    }
}

#[derive(Debug, Clone)]
pub struct QueryGuard {
    /// Configured spelling paired with its lowercase form.
    blocked_words: Vec<(String, String)>,
}

impl QueryGuard {
    pub fn new<I, S>(blocked_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blocked_words: blocked_words
                .into_iter()
                .map(|w| w.as_ref().trim().to_string())
                .filter(|w| !w.is_empty())
                .map(|w| {
                    let lowered = w.to_lowercase();
                    (w, lowered)
                })
                .collect(),
        }
    }

    pub fn check(&self, text: &str) -> GuardOutcome {
        let lowered = text.to_lowercase();
        match self
            .blocked_words
            .iter()
            .find(|(_, needle)| lowered.contains(needle.as_str()))
        {
            Some((word, _)) => GuardOutcome::Block {
                guard: "query",
                message: format!(
                    "I cannot process this request because it contains the blocked keyword '{}'.",
                    word
                ),
            },
            None => GuardOutcome::Allow,
        }
    }
}

/// The token guard followed by the query guard.
#[derive(Debug, Clone)]
pub struct Guardrails {
    token: TokenGuard,
    query: QueryGuard,
}

impl Guardrails {
    pub fn new(token: TokenGuard, query: QueryGuard) -> Self {
        Self { token, query }
    }

    pub fn from_config(config: &GuardrailConfig) -> Self {
        Self::new(
            TokenGuard::new(config.max_query_tokens, config.max_document_tokens),
            QueryGuard::new(&config.blocked_words),
        )
    }

    pub fn check(&self, text: &str, is_document: bool) -> GuardOutcome {
        match self.token.check(text, is_document) {
            GuardOutcome::Allow => self.query.check(text),
            blocked => blocked,
        }
    }
}
