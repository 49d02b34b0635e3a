//! Multi-assistant router.
//!
//! Picks a single assistant per incoming message and hands it the router's
//! shared memory, so the user sees one continuous conversation no matter
//! which backend answers a given turn.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::sync::Mutex;

use crate::assistant::{Assistant, error_reply};
use crate::error::RouterError;
use crate::llm::{ChatMessage, CompletionProvider};
use crate::memory::ConversationMemory;

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));

/// Routes messages to one of several assistants over a shared memory.
pub struct AssistantRouter {
    assistants: Vec<Arc<dyn Assistant>>,
    selector: Arc<dyn CompletionProvider>,
    memory: Mutex<ConversationMemory>,
}

impl AssistantRouter {
    /// Create a router. The assistant list must not be empty.
    pub fn new(
        assistants: Vec<Arc<dyn Assistant>>,
        selector: Arc<dyn CompletionProvider>,
    ) -> Result<Self, RouterError> {
        if assistants.is_empty() {
            return Err(RouterError::NoAssistants);
        }
        Ok(Self {
            assistants,
            selector,
            memory: Mutex::new(ConversationMemory::new()),
        })
    }

    pub fn assistants(&self) -> &[Arc<dyn Assistant>] {
        &self.assistants
    }

    pub fn len(&self) -> usize {
        self.assistants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assistants.is_empty()
    }

    /// Choose the assistant that should answer `message`.
    ///
    /// With a single assistant no provider call is made.
    pub async fn select(&self, message: &str) -> Result<Arc<dyn Assistant>, RouterError> {
        if let [only] = self.assistants.as_slice() {
            return Ok(Arc::clone(only));
        }

        let prompt = selection_prompt(message, &self.assistants);
        let reply = self
            .selector
            .complete(&[ChatMessage::user(prompt)])
            .await
            .map_err(|e| RouterError::Selection {
                reason: format!("selection call failed: {e}"),
            })?;

        let index = parse_index(&reply, self.assistants.len())?;
        tracing::debug!(assistant = index, "Selected assistant");
        Ok(Arc::clone(&self.assistants[index]))
    }

    /// Route `message` to an assistant and return its reply.
    ///
    /// The user turn is recorded in the shared memory before selection, so
    /// it survives a selection failure. The memory stays locked for the
    /// whole turn and concurrent messages are answered one at a time.
    pub async fn process(&self, message: &str) -> Result<String, RouterError> {
        let mut memory = self.memory.lock().await;
        memory.add_user_turn(message);

        let assistant = self.select(message).await?;
        match assistant.generate(&memory).await {
            Ok(reply) => {
                memory.add_assistant_turn(reply.clone());
                Ok(reply)
            }
            Err(e) => {
                tracing::error!(used_for = %assistant.used_for(), "Assistant failed: {}", e);
                Ok(error_reply(e))
            }
        }
    }

    /// Copy of the shared conversation.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.memory.lock().await.snapshot()
    }
}

/// Build the prompt asking the selector which assistant fits `message`.
fn selection_prompt(message: &str, assistants: &[Arc<dyn Assistant>]) -> String {
    let mut prompt = String::from(
        "Choose the assistant best suited to answer the user's message.\n\n",
    );
    prompt.push_str("Message:\n");
    prompt.push_str(message);
    prompt.push_str("\n\nAssistants:\n");
    for (i, assistant) in assistants.iter().enumerate() {
        prompt.push_str(&format!("{i}: {}\n", assistant.used_for()));
    }
    prompt.push_str("\nReply with the number of the assistant only.");
    prompt
}

/// Extract the first integer literal in `reply` and check it against `len`.
fn parse_index(reply: &str, len: usize) -> Result<usize, RouterError> {
    let digits = FIRST_INTEGER
        .find(reply)
        .ok_or_else(|| RouterError::Selection {
            reason: format!("no assistant index in reply: {reply:?}"),
        })?
        .as_str();

    match digits.parse::<usize>() {
        Ok(index) if index < len => Ok(index),
        _ => Err(RouterError::Selection {
            reason: format!("assistant index {digits} out of range (0..{len})"),
        }),
    }
}
