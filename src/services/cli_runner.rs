//! Bounded invocation of a local command-line assistant.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{RelayError, RelayResult};

pub const DEFAULT_PROGRAM: &str = "claude";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const QUERY_PLACEHOLDER: &str = "{query}";

pub fn default_args() -> Vec<String> {
    vec!["-p".into(), QUERY_PLACEHOLDER.into(), "--no-input".into()]
}

/// Captured result of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOutput {
    pub response: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone)]
pub struct CliRunner {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for CliRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl CliRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: default_args(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Argument template. Every `{query}` is replaced with the query text.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn render_args(&self, query: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(QUERY_PLACEHOLDER, query))
            .collect()
    }

    pub async fn run(&self, query: &str) -> RelayResult<CliOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.render_args(query))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program.display(), "spawning CLI tool");

        let child = cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => RelayError::ToolNotFound(self.program.display().to_string()),
            _ => RelayError::Internal(format!("failed to start {}: {e}", self.program.display())),
        })?;

        // dropping the wait future on timeout kills the child
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result
                .map_err(|e| RelayError::Internal(format!("failed to collect CLI output: {e}")))?,
            Err(_) => return Err(RelayError::Timeout(self.timeout)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let response = match stdout.trim() {
            "" => stderr.trim().to_string(),
            out => out.to_string(),
        };
        let exit_code = output.status.code().unwrap_or(-1);

        info!(exit_code, bytes = response.len(), "CLI tool finished");
        Ok(CliOutput { response, exit_code })
    }
}
