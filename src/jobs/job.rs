//! Core types for scheduled jobs.
//!
//! A job is an immutable schedule descriptor: a cron recurrence, a prompt, a
//! destination, and the assistant that turns the prompt into a message. Each
//! firing generates one message and delivers it through a channel.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::assistant::StandaloneAssistant;
use crate::channels::MessageChannel;
use crate::error::JobError;

/// Expression used by one-shot jobs: the next minute boundary.
pub const ONE_SHOT_EXPRESSION: &str = "* * * * *";

/// What a job does after it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Fires at every recurrence boundary until removed.
    Message,
    /// Fires once, then retires itself.
    OneShot,
}

impl JobKind {
    /// The tag used as the first component of a job id.
    pub fn type_tag(&self) -> &'static str {
        match self {
            JobKind::Message => "MessageJob",
            JobKind::OneShot => "OneShotJob",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// A scheduled unit of work that generates and delivers a message.
pub struct Job {
    kind: JobKind,
    expression: String,
    schedule: cron::Schedule,
    prompt: String,
    destination: String,
    assistant: Arc<StandaloneAssistant>,
}

impl Job {
    /// Build a job. Invalid cron expressions are rejected here, not at fire time.
    pub fn new(
        kind: JobKind,
        expression: &str,
        prompt: impl Into<String>,
        destination: impl Into<String>,
        assistant: Arc<StandaloneAssistant>,
    ) -> Result<Self, JobError> {
        let schedule = parse_schedule(expression)?;
        Ok(Self {
            kind,
            expression: expression.split_whitespace().collect::<Vec<_>>().join(" "),
            schedule,
            prompt: prompt.into(),
            destination: destination.into(),
            assistant,
        })
    }

    /// A recurring job.
    pub fn message(
        expression: &str,
        prompt: impl Into<String>,
        destination: impl Into<String>,
        assistant: Arc<StandaloneAssistant>,
    ) -> Result<Self, JobError> {
        Self::new(JobKind::Message, expression, prompt, destination, assistant)
    }

    /// A job that fires once at the next minute boundary.
    pub fn one_shot(
        prompt: impl Into<String>,
        destination: impl Into<String>,
        assistant: Arc<StandaloneAssistant>,
    ) -> Result<Self, JobError> {
        Self::new(
            JobKind::OneShot,
            ONE_SHOT_EXPRESSION,
            prompt,
            destination,
            assistant,
        )
    }

    /// Identity: kind, recurrence, and destination. Jobs sharing it collide.
    pub fn id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.kind.type_tag(),
            self.expression,
            self.destination
        )
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn is_one_shot(&self) -> bool {
        self.kind == JobKind::OneShot
    }

    /// Next fire time strictly after `after`.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Run the prompt through the job's assistant.
    pub async fn generate_message(&self) -> Result<String, JobError> {
        self.assistant
            .respond(&self.prompt)
            .await
            .map_err(|source| JobError::Generation {
                id: self.id(),
                source,
            })
    }

    /// Generate the message and deliver it to the job's destination.
    pub async fn execute(&self, channel: &dyn MessageChannel) -> Result<(), JobError> {
        let message = self.generate_message().await?;
        channel
            .send(&self.destination, &message)
            .await
            .map_err(|source| JobError::Delivery {
                id: self.id(),
                source,
            })?;
        tracing::debug!(job_id = %self.id(), channel = %channel.name(), "Job delivered");
        Ok(())
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("kind", &self.kind)
            .field("expression", &self.expression)
            .field("destination", &self.destination)
            .field("prompt", &self.prompt)
            .finish_non_exhaustive()
    }
}

/// Parse a cron expression.
///
/// Five-field crontab expressions get a leading seconds field of `0`; six and
/// seven field expressions are passed through unchanged.
pub fn parse_schedule(expression: &str) -> Result<cron::Schedule, JobError> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let normalized = match fields.len() {
        5 => format!("0 {}", fields.join(" ")),
        6 | 7 => fields.join(" "),
        n => {
            return Err(JobError::InvalidSchedule {
                expression: expression.to_string(),
                reason: format!("expected 5, 6 or 7 fields, got {n}"),
            });
        }
    };

    cron::Schedule::from_str(&normalized).map_err(|e| JobError::InvalidSchedule {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}
