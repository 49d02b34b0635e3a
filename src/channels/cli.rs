//! CLI channel: stdin/stdout REPL for local use.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::channels::{IncomingMessage, MessageChannel, MessageStream};
use crate::error::ChannelError;

/// Destination id of the local terminal user.
pub const CLI_DESTINATION: &str = "local-user";

/// Reads messages from stdin and prints deliveries to stdout.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }

    /// Start reading stdin. The stream ends at EOF.
    pub fn start(&self) -> MessageStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = IncomingMessage::new("cli", CLI_DESTINATION, &line);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Box::pin(stream)
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a delivery for the terminal. Scheduled messages to other
/// destinations are tagged with their target.
fn render(destination: &str, text: &str) -> String {
    if destination == CLI_DESTINATION {
        format!("\n{text}\n")
    } else {
        format!("\n[to {destination}] {text}\n")
    }
}

#[async_trait]
impl MessageChannel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn send(&self, destination: &str, text: &str) -> Result<(), ChannelError> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(render(destination, text).as_bytes())
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "cli".into(),
                reason: e.to_string(),
            })?;
        stdout.flush().await.map_err(|e| ChannelError::SendFailed {
            name: "cli".into(),
            reason: e.to_string(),
        })?;
        eprint!("> ");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_local_reply_untagged() {
        assert_eq!(render(CLI_DESTINATION, "hello"), "\nhello\n");
    }

    #[test]
    fn render_other_destination_tagged() {
        assert_eq!(render("12345", "standup in 5"), "\n[to 12345] standup in 5\n");
    }

    #[tokio::test]
    async fn send_writes_to_stdout() {
        let channel = CliChannel::new();
        assert_eq!(channel.name(), "cli");
        assert!(channel.send(CLI_DESTINATION, "ok").await.is_ok());
    }
}
