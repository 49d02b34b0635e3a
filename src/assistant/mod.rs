//! Assistants, the units that turn a message plus history into a reply.
//!
//! Core components:
//! - `Assistant`: the delegated form, always handed the memory to use
//! - `StandaloneAssistant`: wraps an assistant with its own private memory
//! - `EchoAssistant`, `ProviderAssistant`: basic variants
//! - `query`: assistant backed by a tool-augmented query agent
//! - `router`: picks one assistant per message over a shared memory

pub mod query;
pub mod router;

pub use query::{QueryAssistant, QueryBackend};
pub use router::AssistantRouter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::DEFAULT_SYSTEM_PROMPT;
use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionProvider};
use crate::memory::ConversationMemory;

/// A backend that answers messages.
///
/// Implementors only generate text. The provided `respond` and `process`
/// methods own the memory contract: the user turn is always recorded, the
/// reply only on success.
#[async_trait]
pub trait Assistant: Send + Sync {
    /// One-line capability description used for routing. Must be side-effect free.
    fn used_for(&self) -> &str;

    /// Produce a reply. `memory` already ends with the user's turn.
    async fn generate(&self, memory: &ConversationMemory) -> Result<String, LlmError>;

    /// Record `message`, generate, and record the reply.
    async fn respond(
        &self,
        message: &str,
        memory: &mut ConversationMemory,
    ) -> Result<String, LlmError> {
        memory.add_user_turn(message);
        let reply = self.generate(memory).await?;
        memory.add_assistant_turn(reply.clone());
        Ok(reply)
    }

    /// Like `respond`, but failures come back as a user-facing apology.
    async fn process(&self, message: &str, memory: &mut ConversationMemory) -> String {
        match self.respond(message, memory).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(used_for = %self.used_for(), "Assistant failed: {}", e);
                error_reply(e)
            }
        }
    }
}

/// User-facing text for a failed exchange.
pub fn error_reply(reason: impl std::fmt::Display) -> String {
    format!("An error occurred: {reason}")
}

/// Assistant that owns its conversation memory.
pub struct StandaloneAssistant {
    inner: Arc<dyn Assistant>,
    memory: Mutex<ConversationMemory>,
}

impl StandaloneAssistant {
    pub fn new(inner: Arc<dyn Assistant>) -> Self {
        Self {
            inner,
            memory: Mutex::new(ConversationMemory::new()),
        }
    }

    pub fn used_for(&self) -> &str {
        self.inner.used_for()
    }

    /// Answer using the private memory. Concurrent callers are serialized.
    pub async fn process(&self, message: &str) -> String {
        let mut memory = self.memory.lock().await;
        self.inner.process(message, &mut memory).await
    }

    /// Answer using the private memory, surfacing failures.
    pub async fn respond(&self, message: &str) -> Result<String, LlmError> {
        let mut memory = self.memory.lock().await;
        self.inner.respond(message, &mut memory).await
    }

    /// Copy of the private conversation.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.memory.lock().await.snapshot()
    }
}

/// Replies with the message it was given.
pub struct EchoAssistant {
    used_for: String,
}

impl EchoAssistant {
    pub fn new() -> Self {
        Self {
            used_for: "echo".to_string(),
        }
    }

    pub fn with_used_for(mut self, used_for: impl Into<String>) -> Self {
        self.used_for = used_for.into();
        self
    }
}

impl Default for EchoAssistant {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Assistant for EchoAssistant {
    fn used_for(&self) -> &str {
        &self.used_for
    }

    async fn generate(&self, memory: &ConversationMemory) -> Result<String, LlmError> {
        let message = memory
            .last_n(1)
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!("You said: {message}"))
    }
}

/// Assistant with a fixed persona backed by a completion provider.
pub struct ProviderAssistant {
    llm: Arc<dyn CompletionProvider>,
    persona: String,
    used_for: String,
    timeout: Duration,
}

impl ProviderAssistant {
    pub fn new(llm: Arc<dyn CompletionProvider>, used_for: impl Into<String>) -> Self {
        Self {
            llm,
            persona: DEFAULT_SYSTEM_PROMPT.to_string(),
            used_for: used_for.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }
}

#[async_trait]
impl Assistant for ProviderAssistant {
    fn used_for(&self) -> &str {
        &self.used_for
    }

    async fn generate(&self, memory: &ConversationMemory) -> Result<String, LlmError> {
        let history = memory.with_persona(&self.persona);
        match tokio::time::timeout(self.timeout, self.llm.complete(&history)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                provider: self.llm.model_name().to_string(),
                timeout: self.timeout,
            }),
        }
    }
}
