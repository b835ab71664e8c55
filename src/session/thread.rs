//! Conversation history and session storage.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::llm::Message;

/// A single conversation session.
///
/// Cloning a `Session` yields another handle to the same conversation.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Client-supplied session identifier.
    id: String,
    /// Exchanged messages, oldest first.
    messages: RwLock<Vec<Message>>,
    /// Serializes read-modify-write turns on this session.
    turn: Mutex<()>,
    created_at: DateTime<Utc>,
    last_activity: RwLock<DateTime<Utc>>,
}

/// Exclusive right to compose against and append to a session.
///
/// Held from prompt composition until the reply is recorded so two
/// concurrent turns cannot interleave.
pub type TurnGuard<'a> = MutexGuard<'a, ()>;

/// Point-in-time copy of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(SessionInner {
                id,
                messages: RwLock::new(Vec::new()),
                turn: Mutex::new(()),
                created_at: now,
                last_activity: RwLock::new(now),
            }),
        }
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Wait for exclusive access to this session's history.
    pub async fn begin_turn(&self) -> TurnGuard<'_> {
        self.inner.turn.lock().await
    }

    /// Get all messages in the conversation.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner
            .messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get the number of messages in the conversation.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.inner
            .messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Append a completed question/reply pair in one step.
    pub fn record_exchange(&self, question: impl Into<String>, reply: impl Into<String>) {
        let mut guard = self
            .inner
            .messages
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.push(Message::user(question));
        guard.push(Message::assistant(reply));
        drop(guard);
        self.touch();
    }

    /// Clear all messages from the session.
    pub fn clear(&self) {
        self.inner
            .messages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.touch();
    }

    /// Copy out the session's current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.inner.id.clone(),
            created_at: self.inner.created_at,
            last_activity: *self
                .inner
                .last_activity
                .read()
                .unwrap_or_else(PoisonError::into_inner),
            messages: self.messages(),
        }
    }

    fn touch(&self) {
        *self
            .inner
            .last_activity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Utc::now();
    }
}

/// Thread-safe store for sessions.
///
/// Sessions are created lazily on first reference and live for the life of
/// the process; there is no eviction.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    /// Create a new session store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a session by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Get a session by ID, creating it if it doesn't exist.
    #[must_use]
    pub fn get_or_create(&self, id: &str) -> Session {
        if let Some(session) = self.get(id) {
            return session;
        }

        // Another task may have inserted between the read and write locks.
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id = %id, "Created session");
                Session::new(id.to_string())
            })
            .clone()
    }

    /// Empty a session's history. Unknown IDs are ignored.
    pub fn clear(&self, id: &str) {
        if let Some(session) = self.get(id) {
            session.clear();
        }
    }

    /// List all session IDs, sorted.
    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Get the number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
