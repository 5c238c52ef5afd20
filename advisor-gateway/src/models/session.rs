//! In-memory conversation session.

use chrono::{DateTime, Utc};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// A conversation between one user and the advisor, kept only in memory.
#[derive(Debug, Clone)]
pub struct Session {
    /// Most recent messages, oldest first.
    pub messages: Vec<SessionMessage>,

    /// When the session last recorded an exchange.
    pub updated_at: DateTime<Utc>,
}

/// A message in a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Session {
    /// Create a new, empty session.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Append a message, keeping at most `capacity` messages.
    pub fn add_message(&mut self, role: Role, content: String, capacity: usize) {
        let now = Utc::now();
        self.messages.push(SessionMessage {
            role,
            content,
            timestamp: now,
        });
        if self.messages.len() > capacity {
            let excess = self.messages.len() - capacity;
            self.messages.drain(..excess);
        }
        self.updated_at = now;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Key under which a user's session is stored.
pub fn session_key(user_id: &str, session_id: &str) -> String {
    format!("{}_{}", user_id, session_id)
}

/// Issue a session id for a client that did not send one.
pub fn generate_session_id(user_id: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "session_{}_{}_{}",
        user_id,
        Utc::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_message_trims_oldest() {
        let mut session = Session::new();
        for i in 0..5 {
            session.add_message(Role::User, format!("q{}", i), 3);
        }

        assert_eq!(session.messages.len(), 3);
        assert_eq!(session.messages[0].content, "q2");
        assert_eq!(session.messages[2].content, "q4");
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut session = Session::new();
        let before = session.updated_at;
        session.add_message(Role::User, "q".into(), 0);
        assert!(session.messages.is_empty());
        assert!(session.updated_at >= before);
    }

    #[test]
    fn generated_ids_are_unique_and_scoped_to_user() {
        let a = generate_session_id("alice");
        let b = generate_session_id("alice");
        assert!(a.starts_with("session_alice_"));
        assert_ne!(a, b);
        assert_eq!(session_key("alice", "s1"), "alice_s1");
    }
}
