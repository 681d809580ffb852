use axum::{Json, extract::State};
use tracing::{info, instrument};

use super::extract::LenientJson;
use crate::{
    error::{RelayError, RelayResult},
    message::{
        AskCliRequest, AskCliResponse, AskRequest, AskResponse, ClearRequest, ClearResponse,
        HealthResponse,
    },
    services::session_manager::Turn,
    state::SharedState,
};

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_string() })
}

/// Conversational path: the reply is generated from the session's full history.
#[instrument(skip_all, fields(session_id = tracing::field::Empty))]
pub async fn ask_handler(
    State(state): State<SharedState>,
    LenientJson(payload): LenientJson<AskRequest>,
) -> RelayResult<Json<AskResponse>> {
    let query = payload.query_text().ok_or_else(RelayError::missing_query)?;
    let session_id = payload.session_id().to_string();
    tracing::Span::current().record("session_id", session_id.as_str());

    let handle = state.sessions.session(&session_id).await;
    let mut conversation = handle.lock().await;

    // kept if the call fails; trimming waits for the assistant turn
    conversation.record(Turn::user(query));
    let history = conversation.turns();

    let reply = state.model.reply(&history).await?;

    let len = conversation.push(Turn::assistant(reply.clone()));
    info!(turns = len, "answered");

    Ok(Json(AskResponse { response: reply, session_id }))
}

/// Stateless path through the local CLI tool.
pub async fn ask_cli_handler(
    State(state): State<SharedState>,
    LenientJson(payload): LenientJson<AskCliRequest>,
) -> RelayResult<Json<AskCliResponse>> {
    let query = payload.query_text().ok_or_else(RelayError::missing_cli_query)?;
    let output = state.cli.run(query).await?;

    Ok(Json(AskCliResponse {
        response: output.response,
        exit_code: output.exit_code,
    }))
}

pub async fn clear_handler(
    State(state): State<SharedState>,
    LenientJson(payload): LenientJson<ClearRequest>,
) -> Json<ClearResponse> {
    let session_id = payload.session_id().to_string();
    let existed = state.sessions.clear(&session_id).await;
    info!(session_id = %session_id, existed, "cleared session");

    Json(ClearResponse { status: "cleared".to_string(), session_id })
}
