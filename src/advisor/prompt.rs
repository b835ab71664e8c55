//! Prompt composition and instruction loading.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::llm::Message;

/// The fixed system instruction prepended to every prompt.
///
/// Loaded once at startup and shared read-only across sessions.
#[derive(Debug, Clone)]
pub struct Instructions(Arc<str>);

impl Instructions {
    /// Wrap an instruction string.
    #[must_use]
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Read the instruction document from disk.
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read instruction file {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            length = text.len(),
            "Instructions loaded"
        );

        Ok(Self::new(text))
    }

    /// The instruction text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Build the prompt for one question.
///
/// The result is the system instruction, then the full prior history
/// (oldest first), then the new question. History is never truncated.
#[must_use]
pub fn compose(instructions: &Instructions, history: &[Message], question: &str) -> Vec<Message> {
    let mut prompt = Vec::with_capacity(history.len() + 2);
    prompt.push(Message::system(instructions.as_str()));
    prompt.extend_from_slice(history);
    prompt.push(Message::user(question));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;
    use std::io::Write;

    #[test]
    fn test_compose_without_history() {
        let prompt = compose(&Instructions::new("Be helpful."), &[], "What is Jitsi?");

        assert_eq!(
            prompt,
            vec![Message::system("Be helpful."), Message::user("What is Jitsi?")]
        );
    }

    #[test]
    fn test_compose_keeps_history_order() {
        let history = vec![
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
            Message::assistant("a2"),
        ];
        let prompt = compose(&Instructions::new("sys"), &history, "q3");

        let roles: Vec<_> = prompt.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
            ]
        );
        assert_eq!(prompt[1].content, "q1");
        assert_eq!(prompt[5].content, "q3");
    }

    #[tokio::test]
    async fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "You advise on open-source software.").unwrap();

        let instructions = Instructions::load(file.path()).await.unwrap();
        assert_eq!(instructions.as_str(), "You advise on open-source software.");
    }

    #[tokio::test]
    async fn test_load_missing_file_names_path() {
        let err = Instructions::load("/definitely/not/here.txt")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.txt"));
    }
}
