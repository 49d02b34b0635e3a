//! Inbound chat commands.
//!
//! Administrative commands start with `/`; anything else is a chat message
//! for the assistant router. `CommandHandler` applies a parsed command to the
//! router and scheduler and says what, if anything, to send back.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;

use crate::assistant::{Assistant, AssistantRouter, StandaloneAssistant, error_reply};
use crate::channels::{IncomingMessage, MessageChannel, MessageStream};
use crate::error::Error;
use crate::jobs::{Job, Scheduler};

/// Greeting sent in reply to `/start`.
pub const GREETING: &str = "Hello! I'm your personal assistant. Send me a message to get started.";

/// Reply to `/start` from a destination that is not on the allow-list.
pub const UNAUTHORIZED: &str = "Sorry, you're not authorized to use this bot.";

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`
    Start,
    /// `/jobs`
    ListJobs,
    /// `/schedule <5 cron fields> <prompt>`
    Schedule { expression: String, prompt: String },
    /// `/once <prompt>`
    Once { prompt: String },
    /// `/remove <job id>`
    Remove { id: String },
    /// `/run <job id>`
    Run { id: String },
    /// `/quit`, `/exit`
    Quit,
    /// Anything else.
    Chat { content: String },
}

/// Parses message text into a [`Command`].
pub struct CommandParser;

impl CommandParser {
    pub fn parse(content: &str) -> Command {
        let trimmed = content.trim();
        let lower = trimmed.to_lowercase();

        match lower.as_str() {
            "/start" => Command::Start,
            "/jobs" => Command::ListJobs,
            "/quit" | "/exit" => Command::Quit,
            _ => parse_with_args(trimmed).unwrap_or_else(|| Command::Chat {
                content: content.to_string(),
            }),
        }
    }
}

/// Commands that take arguments. Malformed ones fall through to chat.
fn parse_with_args(trimmed: &str) -> Option<Command> {
    let (head, rest) = trimmed.split_once(char::is_whitespace)?;
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }

    match head.to_lowercase().as_str() {
        "/schedule" => parse_schedule_args(rest),
        "/once" => Some(Command::Once {
            prompt: rest.to_string(),
        }),
        "/remove" => Some(Command::Remove {
            id: rest.to_string(),
        }),
        "/run" => Some(Command::Run {
            id: rest.to_string(),
        }),
        _ => None,
    }
}

/// `<m> <h> <dom> <mon> <dow> <prompt...>`
fn parse_schedule_args(rest: &str) -> Option<Command> {
    let mut fields = Vec::with_capacity(5);
    let mut remaining = rest;
    for _ in 0..5 {
        let (field, tail) = remaining.trim_start().split_once(char::is_whitespace)?;
        fields.push(field);
        remaining = tail;
    }
    let prompt = remaining.trim();
    if prompt.is_empty() {
        return None;
    }
    Some(Command::Schedule {
        expression: fields.join(" "),
        prompt: prompt.to_string(),
    })
}

/// Resolves once `stop` reads `true`. A dropped sender never stops.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// What to do after handling a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send this text back to the sender.
    Reply(String),
    /// Send nothing.
    Ignore,
    /// Stop the process.
    Quit,
}

/// Applies commands to the router and scheduler.
pub struct CommandHandler {
    router: Arc<AssistantRouter>,
    scheduler: Arc<Scheduler>,
    /// Backend for scheduled jobs; each job gets its own private memory.
    job_backend: Arc<dyn Assistant>,
    allowed: Vec<String>,
    admin_destination: Option<String>,
}

impl CommandHandler {
    pub fn new(
        router: Arc<AssistantRouter>,
        scheduler: Arc<Scheduler>,
        job_backend: Arc<dyn Assistant>,
    ) -> Self {
        Self {
            router,
            scheduler,
            job_backend,
            allowed: Vec::new(),
            admin_destination: None,
        }
    }

    /// Also report handling errors to this destination.
    pub fn with_admin_destination(mut self, admin: Option<String>) -> Self {
        self.admin_destination = admin;
        self
    }

    /// Restrict inbound messages to these destinations. Empty or `*` allows everyone.
    pub fn with_allowed(mut self, allowed: Vec<String>) -> Self {
        self.allowed = allowed;
        self
    }

    pub fn is_allowed(&self, destination: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|d| d == "*" || d == destination)
    }

    /// Handle one inbound message.
    pub async fn handle(&self, msg: &IncomingMessage) -> Result<Outcome, Error> {
        let command = CommandParser::parse(&msg.content);

        if !self.is_allowed(&msg.destination) {
            tracing::warn!(destination = %msg.destination, "Unauthorized message dropped");
            return Ok(match command {
                Command::Start => Outcome::Reply(UNAUTHORIZED.to_string()),
                _ => Outcome::Ignore,
            });
        }

        match command {
            Command::Start => Ok(Outcome::Reply(GREETING.to_string())),
            Command::ListJobs => {
                let ids = self.scheduler.list().await;
                if ids.is_empty() {
                    Ok(Outcome::Reply("No active jobs.".to_string()))
                } else {
                    Ok(Outcome::Reply(ids.join("\n")))
                }
            }
            Command::Schedule { expression, prompt } => {
                let job =
                    Job::message(&expression, prompt, &msg.destination, self.job_assistant())?;
                let id = self.scheduler.add(job).await?;
                Ok(Outcome::Reply(format!("Scheduled {id}")))
            }
            Command::Once { prompt } => {
                let job = Job::one_shot(prompt, &msg.destination, self.job_assistant())?;
                let id = self.scheduler.add(job).await?;
                Ok(Outcome::Reply(format!("Scheduled {id}")))
            }
            Command::Remove { id } => {
                if self.scheduler.remove(&id).await {
                    Ok(Outcome::Reply(format!("Removed {id}")))
                } else {
                    Ok(Outcome::Reply(format!("No job {id}")))
                }
            }
            Command::Run { id } => {
                self.scheduler.run_now(&id).await?;
                Ok(Outcome::Ignore)
            }
            Command::Quit => Ok(Outcome::Quit),
            Command::Chat { content } => {
                let reply = self.router.process(&content).await?;
                Ok(Outcome::Reply(reply))
            }
        }
    }

    fn job_assistant(&self) -> Arc<StandaloneAssistant> {
        Arc::new(StandaloneAssistant::new(Arc::clone(&self.job_backend)))
    }

    /// Handle inbound messages until end of input, `/quit`, or `stop`.
    ///
    /// Replies go out through `replies`. When `stop` flips to `true` while a
    /// message is being handled, that message gets `grace` to finish before
    /// it is dropped.
    pub async fn serve(
        &self,
        mut inbound: MessageStream,
        replies: &dyn MessageChannel,
        grace: Duration,
        mut stop: watch::Receiver<bool>,
    ) {
        loop {
            if *stop.borrow() {
                break;
            }
            let msg = tokio::select! {
                msg = inbound.next() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
                _ = stop_requested(&mut stop) => break,
            };

            let handling = self.handle(&msg);
            tokio::pin!(handling);
            let (result, stopping) = tokio::select! {
                result = &mut handling => (result, false),
                _ = stop_requested(&mut stop) => {
                    match tokio::time::timeout(grace, &mut handling).await {
                        Ok(result) => (result, true),
                        Err(_) => {
                            tracing::warn!(
                                destination = %msg.destination,
                                "Grace period elapsed, dropping in-flight message"
                            );
                            break;
                        }
                    }
                }
            };

            if !self.dispatch(&msg, result, replies).await || stopping {
                break;
            }
        }
    }

    /// Send the outcome of one message. Returns `false` when asked to quit.
    async fn dispatch(
        &self,
        msg: &IncomingMessage,
        result: Result<Outcome, Error>,
        replies: &dyn MessageChannel,
    ) -> bool {
        match result {
            Ok(Outcome::Reply(text)) => {
                if let Err(e) = replies.send(&msg.destination, &text).await {
                    tracing::error!(destination = %msg.destination, "Reply failed: {}", e);
                }
                true
            }
            Ok(Outcome::Ignore) => true,
            Ok(Outcome::Quit) => false,
            Err(e) => {
                tracing::error!(destination = %msg.destination, "Error handling message: {}", e);
                if let Some(admin) = &self.admin_destination {
                    let report = format!("Error handling message from {}: {}", msg.destination, e);
                    if let Err(send_err) = replies.send(admin, &report).await {
                        tracing::error!("Could not report error to admin: {}", send_err);
                    }
                }
                if let Err(send_err) = replies.send(&msg.destination, &error_reply(&e)).await {
                    tracing::error!(
                        destination = %msg.destination,
                        "Could not send error reply: {}",
                        send_err
                    );
                }
                true
            }
        }
    }
}
