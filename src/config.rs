//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Persona used when `ASSIST_SYSTEM_PROMPT` is not set.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful personal assistant called Mpaia. Your replies are short and concise.";

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Completion provider settings.
    pub llm: LlmConfig,
    /// Persona for the default assistant.
    pub system_prompt: String,
    /// Destinations allowed to talk to the bot. Empty means everyone.
    pub allowed_destinations: Vec<String>,
    /// Where handler errors are reported, if anywhere.
    pub admin_destination: Option<String>,
    /// Upper bound on a single completion call.
    pub provider_timeout: Duration,
    /// How long shutdown waits for in-flight work.
    pub shutdown_grace: Duration,
    /// Directory for rolling log files.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match get("ASSIST_LLM_BACKEND") {
            Some(raw) => raw.parse::<LlmBackend>().map_err(|message| {
                ConfigError::InvalidValue {
                    key: "ASSIST_LLM_BACKEND".to_string(),
                    message,
                }
            })?,
            None => LlmBackend::Anthropic,
        };

        let key_var = backend.api_key_var();
        let api_key = get(key_var).ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;

        let model = get("ASSIST_MODEL").unwrap_or_else(|| backend.default_model().to_string());

        let allowed_destinations = get("ASSIST_ALLOWED_DESTINATIONS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: secrecy::SecretString::from(api_key),
                model,
            },
            system_prompt: get("ASSIST_SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            allowed_destinations,
            admin_destination: get("ASSIST_ADMIN_DESTINATION"),
            provider_timeout: parse_secs(&get, "ASSIST_PROVIDER_TIMEOUT_SECS", 60)?,
            shutdown_grace: parse_secs(&get, "ASSIST_SHUTDOWN_GRACE_SECS", 10)?,
            log_dir: get("ASSIST_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_secs<F>(get: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
        None => Ok(Duration::from_secs(default)),
    }
}
