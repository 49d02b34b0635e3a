//! Error types for Mpaia.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Router error: {0}")]
    Router(#[from] RouterError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send message on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Completion provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Assistant selection errors.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("A router needs at least one assistant")]
    NoAssistants,

    #[error("Could not select an assistant: {reason}")]
    Selection { reason: String },
}

/// Scheduled job errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Schedule '{expression}' has no upcoming fire time")]
    NoUpcomingFire { expression: String },

    #[error("Job {id} not found")]
    NotFound { id: String },

    #[error("Job {id} could not be registered: {reason}")]
    Trigger { id: String, reason: String },

    #[error("Job {id} could not generate its message: {source}")]
    Generation {
        id: String,
        #[source]
        source: LlmError,
    },

    #[error("Job {id} delivery failed: {source}")]
    Delivery {
        id: String,
        #[source]
        source: ChannelError,
    },

    #[error("Scheduler is shut down")]
    ShutDown,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
