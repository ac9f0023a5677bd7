//! Conversation store contract (spec §6) and its in-memory reference implementation.
//!
//! An append-only per-session log supplying recent turns as context to the
//! intent analyzer and answer synthesizer. Per spec §5, concurrent requests
//! for the same session serialize on a per-session lock; independent
//! sessions never contend with each other.

use crate::model::{ConversationTurn, Role};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The conversation persistence contract (spec §6 "Conversation Store contract").
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends one turn to `session_id`'s log, in call order.
    async fn append_turn(&self, session_id: &str, role: Role, text: &str);

    /// Returns the most recent `n` turns for `session_id`, oldest first.
    async fn get_recent(&self, session_id: &str, n: usize) -> Vec<ConversationTurn>;

    /// Starts a new session and returns its id.
    ///
    /// Per the resolved Open Question (spec §9): this does not touch any
    /// existing session's turns. They remain in the store under the old id,
    /// retrievable but no longer "current" — nothing is flushed or deleted.
    fn start_new_session(&self) -> String;

    /// Deletes a session and its entire log.
    async fn delete_session(&self, session_id: &str);
}

/// In-memory [`ConversationStore`]: one `tokio::sync::Mutex`-guarded log per
/// session, all behind a lock-free `DashMap` so unrelated sessions never
/// contend (spec §5).
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    sessions: DashMap<String, Arc<Mutex<Vec<ConversationTurn>>>>,
    session_counter: AtomicU64,
}

impl InMemoryConversationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn log_for(&self, session_id: &str) -> Arc<Mutex<Vec<ConversationTurn>>> {
        self.sessions.entry(session_id.to_string()).or_default().clone()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn append_turn(&self, session_id: &str, role: Role, text: &str) {
        let log = self.log_for(session_id);
        let mut guard = log.lock().await;
        guard.push(ConversationTurn::new(session_id, role, text));
    }

    async fn get_recent(&self, session_id: &str, n: usize) -> Vec<ConversationTurn> {
        let Some(log) = self.sessions.get(session_id).map(|e| e.value().clone()) else {
            return Vec::new();
        };
        let guard = log.lock().await;
        let start = guard.len().saturating_sub(n);
        guard[start..].to_vec()
    }

    fn start_new_session(&self) -> String {
        let n = self.session_counter.fetch_add(1, Ordering::Relaxed);
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        format!("session-{seed:x}-{n}")
    }

    async fn delete_session(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }
}
