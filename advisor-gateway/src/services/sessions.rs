//! Process-local session store.

use crate::config::{PromptConfig, SessionConfig};
use crate::models::{session_key, Role, Session, SessionMessage};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Concurrent map of sessions keyed by `"{user_id}_{session_id}"`.
///
/// A session exists only once an exchange has been answered. Sessions idle
/// for longer than `idle_ttl` are dropped, and when `max_sessions` is reached
/// the least recently used one is evicted to make room.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
    /// Messages retained per session.
    capacity: usize,
    max_sessions: usize,
    idle_ttl: Duration,
}

impl SessionStore {
    pub fn new(capacity: usize, max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            capacity,
            max_sessions: max_sessions.max(1),
            idle_ttl,
        }
    }

    /// Sized to hold `max_history_turns` user/model exchanges per session.
    pub fn from_config(prompt: &PromptConfig, sessions: &SessionConfig) -> Self {
        Self::new(
            prompt.max_history_turns.saturating_mul(2),
            sessions.max_sessions,
            sessions.idle_ttl,
        )
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        // negative idle time (clock skew) never expires
        (now - session.updated_at)
            .to_std()
            .map(|idle| idle > self.idle_ttl)
            .unwrap_or(false)
    }

    /// Stored messages of a live session, oldest first.
    ///
    /// `None` when the session does not exist or has expired.
    pub fn history(&self, user_id: &str, session_id: &str) -> Option<Vec<SessionMessage>> {
        let key = session_key(user_id, session_id);
        let now = Utc::now();

        let live = self
            .sessions
            .get(&key)
            .map(|entry| (!self.is_expired(entry.value(), now)).then(|| entry.messages.clone()))?;

        if live.is_none()
            && self
                .sessions
                .remove_if(&key, |_, s| self.is_expired(s, now))
                .is_some()
        {
            tracing::info!(session_key = %key, "Session expired");
        }
        live
    }

    /// Append a question and its answer to an existing session.
    ///
    /// Returns false when the session is gone, e.g. deleted while the
    /// provider was answering. Nothing is recorded in that case.
    pub fn append_exchange(
        &self,
        user_id: &str,
        session_id: &str,
        query: &str,
        reply: &str,
    ) -> bool {
        match self.sessions.get_mut(&session_key(user_id, session_id)) {
            Some(mut session) => {
                session.add_message(Role::User, query.to_string(), self.capacity);
                session.add_message(Role::Model, reply.to_string(), self.capacity);
                true
            }
            None => false,
        }
    }

    /// Create a session holding its first answered exchange.
    pub fn start_with_exchange(&self, user_id: &str, session_id: &str, query: &str, reply: &str) {
        let key = session_key(user_id, session_id);
        self.make_room(&key);

        let mut session = self.sessions.entry(key.clone()).or_insert_with(|| {
            tracing::info!(session_key = %key, "Session created");
            Session::new()
        });
        session.add_message(Role::User, query.to_string(), self.capacity);
        session.add_message(Role::Model, reply.to_string(), self.capacity);
    }

    /// Drop expired sessions, then evict the least recently used ones until
    /// a new session fits.
    fn make_room(&self, incoming: &str) {
        if self.sessions.contains_key(incoming) {
            return;
        }
        self.prune_expired();

        while self.sessions.len() >= self.max_sessions {
            // collect first, a live iterator holds shard locks
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|entry| entry.updated_at)
                .map(|entry| entry.key().clone());

            let Some(key) = oldest else { break };
            if self.sessions.remove(&key).is_some() {
                tracing::info!(
                    session_key = %key,
                    max_sessions = self.max_sessions,
                    "Session evicted"
                );
            }
        }
    }

    /// Remove every expired session, returning how many were dropped.
    pub fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| !self.is_expired(session, now));
        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            tracing::info!(pruned, "Expired sessions removed");
        }
        pruned
    }

    /// All live session keys, sorted.
    pub fn list_keys(&self) -> Vec<String> {
        self.prune_expired();
        let mut keys: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Remove a session, returning whether it existed.
    pub fn remove(&self, user_id: &str, session_id: &str) -> bool {
        let removed = self
            .sessions
            .remove(&session_key(user_id, session_id))
            .is_some();
        if removed {
            tracing::info!(user_id, session_id, "Session deleted");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
