//! State shared by every request handler.

use std::sync::Arc;

use crate::config::Config;
use crate::error::RelayResult;
use crate::services::cli_runner::CliRunner;
use crate::services::llm_client::{AnthropicClient, ChatModel};
use crate::services::session_manager::SessionManager;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub sessions: SessionManager,
    pub model: Arc<dyn ChatModel>,
    pub cli: CliRunner,
}

impl AppState {
    pub fn new(sessions: SessionManager, model: Arc<dyn ChatModel>, cli: CliRunner) -> Self {
        Self { sessions, model, cli }
    }

    pub fn from_config(config: &Config) -> RelayResult<Self> {
        let model = AnthropicClient::new(config.llm.clone())?;
        Ok(Self::new(
            SessionManager::new(config.history_limit),
            Arc::new(model),
            config.cli_runner(),
        ))
    }
}
