//! Request-boundary errors and their JSON rendering.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

pub const NO_QUERY: &str = "No query provided";
pub const DIDNT_CATCH_THAT: &str = "I didn't catch that.";
pub const GENERIC_FAILURE: &str = "Sorry, I encountered an error processing that request.";
pub const TIMED_OUT: &str = "Request timed out.";
pub const CLI_NOT_FOUND: &str = "Claude CLI not found. Make sure it's installed.";

#[derive(Debug, Error)]
pub enum RelayError {
    /// Bad input. `spoken` is the fallback read out to the user, if any.
    #[error("{message}")]
    Validation {
        message: String,
        spoken: Option<&'static str>,
    },

    #[error("{0}")]
    RemoteService(String),

    #[error("CLI tool timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("CLI tool not found: {0}")]
    ToolNotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl RelayError {
    /// Missing query on `/ask`, carries a spoken fallback.
    pub fn missing_query() -> Self {
        Self::Validation {
            message: NO_QUERY.to_string(),
            spoken: Some(DIDNT_CATCH_THAT),
        }
    }

    /// Missing query on `/ask-cli`, error field only.
    pub fn missing_cli_query() -> Self {
        Self::Validation {
            message: NO_QUERY.to_string(),
            spoken: None,
        }
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::RemoteService(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::RemoteService(_) | Self::ToolNotFound(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::Validation { message, spoken } => ErrorBody {
                error: Some(message.clone()),
                response: spoken.map(str::to_string),
            },
            Self::RemoteService(msg) | Self::Internal(msg) => ErrorBody {
                error: Some(msg.clone()),
                response: Some(GENERIC_FAILURE.to_string()),
            },
            Self::Timeout(_) => ErrorBody {
                error: None,
                response: Some(TIMED_OUT.to_string()),
            },
            Self::ToolNotFound(_) => ErrorBody {
                error: None,
                response: Some(CLI_NOT_FOUND.to_string()),
            },
        }
    }
}

/// JSON error payload: machine-readable `error` and spoken `response`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Self::RemoteService(_) | Self::Internal(_) | Self::ToolNotFound(_) => {
                error!(status = status.as_u16(), error = %self, "request failed");
            }
            Self::Timeout(_) => {
                warn!(status = status.as_u16(), error = %self, "request timed out");
            }
            Self::Validation { .. } => {
                debug!(status = status.as_u16(), error = %self, "rejected request");
            }
        }

        (status, Json(self.body())).into_response()
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
