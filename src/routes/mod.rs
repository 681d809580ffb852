//! HTTP route table.

pub mod ask;
pub mod extract;

use crate::state::SharedState;
use ask::{ask_cli_handler, ask_handler, clear_handler, health_handler};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub fn create_router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ask", post(ask_handler))
        .route("/ask-cli", post(ask_cli_handler))
        .route("/clear", post(clear_handler))
        .layer(TraceLayer::new_for_http())
}
