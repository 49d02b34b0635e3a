//! Channel abstraction for message delivery.

pub mod cli;

pub use cli::CliChannel;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// Bot-agnostic outbound delivery.
///
/// Shared as `Arc<dyn MessageChannel>` between the inbound handler and the
/// job scheduler.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Channel identifier, used for logging.
    fn name(&self) -> &str;

    /// Deliver `text` to `destination`.
    async fn send(&self, destination: &str, text: &str) -> Result<(), ChannelError>;
}

/// A message received from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Channel that received the message.
    pub channel: String,
    /// Where replies to this message go.
    pub destination: String,
    /// Message text.
    pub content: String,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        destination: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            destination: destination.into(),
            content: content.into(),
        }
    }
}

/// Stream of inbound messages.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;
