//! Data-query assistant.
//!
//! Proxies to a secondary backend (a tool-augmented query agent) that may make
//! several internal provider calls before producing one final answer. At the
//! boundary it honours the same memory contract as every other assistant.

use std::sync::Arc;

use async_trait::async_trait;

use crate::assistant::Assistant;
use crate::error::LlmError;
use crate::llm::ChatMessage;
use crate::memory::ConversationMemory;

/// A backend that answers questions about some data source.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Answer `question`, given the conversation so far (including `question`).
    async fn answer(&self, question: &str, history: &[ChatMessage]) -> Result<String, LlmError>;
}

/// Assistant that delegates to a [`QueryBackend`].
pub struct QueryAssistant {
    backend: Arc<dyn QueryBackend>,
    used_for: String,
}

impl QueryAssistant {
    pub fn new(backend: Arc<dyn QueryBackend>, used_for: impl Into<String>) -> Self {
        Self {
            backend,
            used_for: used_for.into(),
        }
    }
}

#[async_trait]
impl Assistant for QueryAssistant {
    fn used_for(&self) -> &str {
        &self.used_for
    }

    async fn generate(&self, memory: &ConversationMemory) -> Result<String, LlmError> {
        let history = memory.messages();
        let question = history.last().map(|m| m.content.as_str()).unwrap_or_default();
        self.backend.answer(question, history).await
    }
}
