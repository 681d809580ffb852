//! JSON bodies of the webhook endpoints.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Debug, Default, Deserialize)]
pub struct AskRequest {
    pub query: Option<String>,
    pub text: Option<String>,
    pub message: Option<String>,
    pub session_id: Option<String>,
}

impl AskRequest {
    /// First non-blank of `query`, `text`, `message`.
    pub fn query_text(&self) -> Option<&str> {
        [&self.query, &self.text, &self.message]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    pub fn session_id(&self) -> &str {
        resolve_session_id(self.session_id.as_deref())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub response: String,
    pub session_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AskCliRequest {
    pub query: Option<String>,
}

impl AskCliRequest {
    pub fn query_text(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskCliResponse {
    pub response: String,
    pub exit_code: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearRequest {
    pub session_id: Option<String>,
}

impl ClearRequest {
    pub fn session_id(&self) -> &str {
        resolve_session_id(self.session_id.as_deref())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub status: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Absent or null ids fall back to the default; any given string is used as is.
fn resolve_session_id(raw: Option<&str>) -> &str {
    raw.unwrap_or(DEFAULT_SESSION_ID)
}
