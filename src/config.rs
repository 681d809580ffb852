//! Server configuration, read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::services::cli_runner::{self, CliRunner};
use crate::services::llm_client::LlmSettings;
use crate::services::session_manager::DEFAULT_HISTORY_LIMIT;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub llm: LlmSettings,
    pub history_limit: usize,
    pub cli_program: PathBuf,
    pub cli_args: Vec<String>,
    pub cli_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            llm: LlmSettings::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            cli_program: PathBuf::from(cli_runner::DEFAULT_PROGRAM),
            cli_args: cli_runner::default_args(),
            cli_timeout: cli_runner::DEFAULT_TIMEOUT,
        }
    }
}

impl Config {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup. Unset or blank keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(get("PORT"), "PORT", defaults.port)?,
            llm: LlmSettings {
                api_key: get("ANTHROPIC_API_KEY"),
                base_url: get("ANTHROPIC_BASE_URL").unwrap_or(defaults.llm.base_url),
                model: get("ANTHROPIC_MODEL").unwrap_or(defaults.llm.model),
                max_tokens: parse_or(get("MAX_TOKENS"), "MAX_TOKENS", defaults.llm.max_tokens)?,
                system_prompt: get("SYSTEM_PROMPT").unwrap_or(defaults.llm.system_prompt),
            },
            history_limit: parse_or(get("HISTORY_LIMIT"), "HISTORY_LIMIT", defaults.history_limit)?,
            cli_program: get("CLI_PROGRAM").map(PathBuf::from).unwrap_or(defaults.cli_program),
            cli_args: get("CLI_ARGS")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or(defaults.cli_args),
            cli_timeout: get("CLI_TIMEOUT_SECS")
                .map(|v| parse_or(Some(v), "CLI_TIMEOUT_SECS", 0u64).map(Duration::from_secs))
                .transpose()?
                .unwrap_or(defaults.cli_timeout),
        })
    }

    pub fn cli_runner(&self) -> CliRunner {
        CliRunner::new(self.cli_program.clone())
            .with_args(self.cli_args.clone())
            .with_timeout(self.cli_timeout)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v.parse().with_context(|| format!("invalid value for {key}: {v:?}")),
        None => Ok(default),
    }
}
