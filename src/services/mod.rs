pub mod cli_runner;
pub mod llm_client;
pub mod session_manager;
