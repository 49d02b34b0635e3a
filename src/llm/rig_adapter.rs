//! Bridges rig-core completion models to [`CompletionProvider`].

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{Chat, CompletionModel};
use rig::message::Message;

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionProvider, Role};

/// Adapter over any rig completion model.
///
/// System turns become the agent preamble, the final user turn becomes the
/// prompt and everything in between is passed as chat history.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
        }
    }
}

/// Split a history into (preamble, prior turns, prompt).
///
/// The preamble is `None` when the history carries no system turn.
fn split_history(history: &[ChatMessage]) -> Option<(Option<String>, Vec<Message>, String)> {
    let (last, rest) = history.split_last()?;
    if last.role != Role::User {
        return None;
    }

    let system: Vec<&str> = rest
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .filter(|c| !c.trim().is_empty())
        .collect();
    let preamble = (!system.is_empty()).then(|| system.join("\n\n"));

    let prior = rest
        .iter()
        .filter_map(|m| match m.role {
            Role::User => Some(Message::user(m.content.clone())),
            Role::Assistant => Some(Message::assistant(m.content.clone())),
            Role::System => None,
        })
        .collect();

    Some((preamble, prior, last.content.clone()))
}

#[async_trait]
impl<M> CompletionProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, history: &[ChatMessage]) -> Result<String, LlmError> {
        let (preamble, prior, prompt) =
            split_history(history).ok_or_else(|| LlmError::RequestFailed {
                provider: self.model_name.clone(),
                reason: "history must end with a user turn".to_string(),
            })?;

        let mut builder = AgentBuilder::new(self.model.clone());
        if let Some(preamble) = &preamble {
            builder = builder.preamble(preamble);
        }
        let agent = builder.build();

        let reply = agent
            .chat(prompt, prior)
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.model_name.clone(),
                reason: e.to_string(),
            })?;

        if reply.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.model_name.clone(),
                reason: "empty completion".to_string(),
            });
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_rejects_empty_history() {
        assert!(split_history(&[]).is_none());
    }

    #[test]
    fn split_rejects_trailing_assistant_turn() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        assert!(split_history(&history).is_none());
    }

    #[test]
    fn split_separates_preamble_history_and_prompt() {
        let history = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("weather?"),
        ];
        let (preamble, prior, prompt) = split_history(&history).unwrap();
        assert_eq!(preamble.as_deref(), Some("be brief"));
        assert_eq!(prior.len(), 2);
        assert_eq!(prompt, "weather?");
    }

    #[test]
    fn split_without_system_turn_has_no_preamble() {
        let history = vec![ChatMessage::user("Which assistant? Reply with the number.")];
        let (preamble, prior, prompt) = split_history(&history).unwrap();
        assert!(preamble.is_none());
        assert!(prior.is_empty());
        assert_eq!(prompt, "Which assistant? Reply with the number.");
    }

    #[test]
    fn blank_system_turn_is_not_a_preamble() {
        let history = vec![ChatMessage::system("  "), ChatMessage::user("hi")];
        let (preamble, _, _) = split_history(&history).unwrap();
        assert!(preamble.is_none());
    }
}
