//! Prompt assembly: static advisor guidance, recent session turns, then the
//! new question.

use crate::config::PromptConfig;
use crate::models::{Role, SessionMessage};

/// One message of the conversation sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTurn {
    pub role: Role,
    pub text: String,
}

/// Everything a provider needs to answer one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system_instruction: String,
    /// Conversation turns, oldest first; the last one is the current query.
    pub turns: Vec<PromptTurn>,
    /// Inbound `x-request-id`, forwarded on the provider call.
    pub request_id: Option<String>,
}

impl Prompt {
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Text of the query being answered.
    pub fn query(&self) -> &str {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
            .unwrap_or_default()
    }

    /// Total characters across instruction and turns.
    pub fn char_len(&self) -> usize {
        self.system_instruction.chars().count()
            + self.turns.iter().map(|t| t.text.chars().count()).sum::<usize>()
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    guidance: String,
    max_history_turns: usize,
}

impl PromptBuilder {
    pub fn new(guidance: impl Into<String>, max_history_turns: usize) -> Self {
        Self {
            guidance: guidance.into(),
            max_history_turns,
        }
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        Self::new(config.guidance.clone(), config.max_history_turns)
    }

    /// Build the prompt for `query`, replaying at most `max_history_turns`
    /// exchanges from `history`.
    pub fn build(&self, history: &[SessionMessage], query: &str) -> Prompt {
        let keep = self.max_history_turns.saturating_mul(2).min(history.len());
        let mut turns: Vec<PromptTurn> = history[history.len() - keep..]
            .iter()
            .map(|m| PromptTurn {
                role: m.role,
                text: m.content.clone(),
            })
            .collect();

        // Providers expect the conversation to open with the user
        while turns.first().is_some_and(|t| t.role != Role::User) {
            turns.remove(0);
        }

        turns.push(PromptTurn {
            role: Role::User,
            text: query.to_string(),
        });

        Prompt {
            system_instruction: self.guidance.clone(),
            turns,
            request_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(role: Role, content: &str) -> SessionMessage {
        SessionMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn query_without_history_is_single_turn() {
        let builder = PromptBuilder::new("Be a BU advisor.", 3);
        let prompt = builder.build(&[], "What major fits someone interested in data science?");

        assert_eq!(prompt.system_instruction, "Be a BU advisor.");
        assert_eq!(prompt.turns.len(), 1);
        assert_eq!(
            prompt.query(),
            "What major fits someone interested in data science?"
        );
    }

    #[test]
    fn history_is_capped_to_recent_exchanges() {
        let history = vec![
            msg(Role::User, "q1"),
            msg(Role::Model, "a1"),
            msg(Role::User, "q2"),
            msg(Role::Model, "a2"),
        ];
        let prompt = PromptBuilder::new("g", 1).build(&history, "q3");

        let texts: Vec<&str> = prompt.turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q2", "a2", "q3"]);
        assert_eq!(prompt.turns[1].role, Role::Model);
    }

    #[test]
    fn leading_model_turns_are_dropped() {
        let history = vec![msg(Role::Model, "orphan answer"), msg(Role::User, "q1")];
        let prompt = PromptBuilder::new("g", 5).build(&history, "q2");

        assert_eq!(prompt.turns[0].text, "q1");
        assert_eq!(prompt.turns.len(), 2);
    }

    #[test]
    fn zero_history_turns_ignores_session() {
        let history = vec![msg(Role::User, "q1"), msg(Role::Model, "a1")];
        let prompt = PromptBuilder::new("g", 0).build(&history, "q2");
        assert_eq!(prompt.turns.len(), 1);
        assert_eq!(prompt.char_len(), 3);
    }
}
