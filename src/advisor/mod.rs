//! The open-source advisor.
//!
//! [`AdvisorService`] ties together the session store, prompt composition and
//! the completion client. Each question is answered against the session's
//! full history, and only successful exchanges are recorded.

pub mod prompt;

pub use prompt::{Instructions, compose};

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::llm::{CompletionClient, UpstreamError};
use crate::session::{SessionSnapshot, SessionStore};

/// Session used when a client does not name one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Errors returned by [`AdvisorService::ask`].
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    /// The completion service failed; history was left untouched.
    #[error("Error processing question: {0}")]
    Upstream(#[from] UpstreamError),
}

/// Answers questions with per-session conversation memory.
pub struct AdvisorService {
    sessions: SessionStore,
    instructions: Instructions,
    client: Arc<dyn CompletionClient>,
}

impl std::fmt::Debug for AdvisorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorService")
            .field("sessions", &self.sessions.len())
            .field("instructions_len", &self.instructions.as_str().len())
            .finish_non_exhaustive()
    }
}

impl AdvisorService {
    /// Create a new advisor over the given store and client.
    #[must_use]
    pub fn new(
        sessions: SessionStore,
        instructions: Instructions,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            sessions,
            instructions,
            client,
        }
    }

    /// Answer a question within a session.
    ///
    /// The session is created if it does not exist. Concurrent calls on the
    /// same session are serialized; calls on different sessions run
    /// independently.
    ///
    /// # Errors
    ///
    /// Returns [`AdvisorError::Upstream`] if the completion call fails; the
    /// session's history is left unchanged.
    pub async fn ask(&self, question: &str, session_id: &str) -> Result<String, AdvisorError> {
        let session = self.sessions.get_or_create(session_id);
        let _turn = session.begin_turn().await;

        let prompt = compose(&self.instructions, &session.messages(), question);
        let request_id = Uuid::new_v4();
        let started = Instant::now();

        match self.client.complete(&prompt).await {
            Ok(reply) => {
                session.record_exchange(question, reply.clone());
                tracing::info!(
                    name: "advisor.ask.completed",
                    request_id = %request_id,
                    session_id = %session_id,
                    prompt_messages = prompt.len(),
                    history_len = session.message_count(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "Question answered"
                );
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(
                    name: "advisor.ask.failed",
                    request_id = %request_id,
                    session_id = %session_id,
                    prompt_messages = prompt.len(),
                    elapsed_ms = started.elapsed().as_millis(),
                    error = %e,
                    "Completion failed; history unchanged"
                );
                Err(e.into())
            }
        }
    }

    /// Clear a session's history. Always succeeds.
    ///
    /// Waits for any in-flight question on the session to finish first.
    pub async fn clear_history(&self, session_id: &str) {
        if let Some(session) = self.sessions.get(session_id) {
            let _turn = session.begin_turn().await;
            session.clear();
            tracing::info!(session_id = %session_id, "History cleared");
        }
    }

    /// List the IDs of every session seen so far.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<String> {
        self.sessions.list_ids()
    }

    /// Copy out one session's history, if it exists.
    #[must_use]
    pub fn history(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.sessions.get(session_id).map(|s| s.snapshot())
    }
}
