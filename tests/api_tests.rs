use voice_relay::error::RelayError;
use voice_relay::message::{AskResponse, ClearResponse};
use voice_relay::routes::create_router;
use voice_relay::services::cli_runner::CliRunner;
use voice_relay::services::llm_client::ChatModel;
use voice_relay::services::session_manager::{MessageRole, SessionManager, Turn};
use voice_relay::state::AppState;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

/// Replays canned replies and records every history it was given.
#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedModel {
    fn replying(replies: &[&str]) -> Arc<Self> {
        let model = Self::default();
        model
            .replies
            .lock()
            .unwrap()
            .extend(replies.iter().map(|r| Ok(r.to_string())));
        Arc::new(model)
    }

    fn failing(msg: &str) -> Arc<Self> {
        let model = Self::default();
        model.replies.lock().unwrap().push_back(Err(msg.to_string()));
        Arc::new(model)
    }

    fn calls(&self) -> Vec<Vec<Turn>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn reply(&self, history: &[Turn]) -> Result<String, RelayError> {
        self.calls.lock().unwrap().push(history.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(msg)) => Err(RelayError::remote(msg)),
            None => Ok("ok".to_string()),
        }
    }
}

fn app_with(model: Arc<ScriptedModel>, cli: CliRunner) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(SessionManager::default(), model, cli));
    (create_router().with_state(state.clone()), state)
}

fn app(model: Arc<ScriptedModel>) -> (Router, Arc<AppState>) {
    app_with(model, CliRunner::new("echo"))
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body_bytes).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = app(ScriptedModel::replying(&[]));
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn test_ask_returns_reply_and_stores_two_turns() {
    let model = ScriptedModel::replying(&["Hi there!"]);
    let (app, state) = app(model.clone());

    let (status, body) = send(&app, post("/ask", r#"{"query":"hello","session_id":"s1"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    let resp: AskResponse = serde_json::from_value(body).unwrap();
    assert_eq!(resp.response, "Hi there!");
    assert_eq!(resp.session_id, "s1");

    let history = state.sessions.history("s1").await.unwrap();
    assert_eq!(history, vec![Turn::user("hello"), Turn::assistant("Hi there!")]);
    assert_eq!(model.calls(), vec![vec![Turn::user("hello")]]);
}

#[tokio::test]
async fn test_ask_accepts_text_and_message_fields() {
    let model = ScriptedModel::replying(&["one", "two"]);
    let (app, _) = app(model.clone());

    let (status, body) = send(&app, post("/ask", r#"{"query":"","text":"from text"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "default");

    let (status, _) = send(&app, post("/ask", r#"{"message":"from message"}"#)).await;
    assert_eq!(status, StatusCode::OK);

    let calls = model.calls();
    assert_eq!(calls[0].last(), Some(&Turn::user("from text")));
    assert_eq!(calls[1].last(), Some(&Turn::user("from message")));
    // same default session, so the second call sees the first exchange
    assert_eq!(calls[1].len(), 3);
}

#[tokio::test]
async fn test_ask_without_query_is_rejected_before_model_call() {
    let model = ScriptedModel::replying(&["never"]);
    let (app, state) = app(model.clone());

    for body in [r#"{}"#, r#"{"query":"","text":"","message":""}"#, r#"{"query":"   "}"#, ""] {
        let (status, resp) = send(&app, post("/ask", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            resp,
            serde_json::json!({"error": "No query provided", "response": "I didn't catch that."})
        );
    }

    assert!(model.calls().is_empty());
    assert!(state.sessions.is_empty().await);
}

#[tokio::test]
async fn test_ask_tolerates_missing_content_type() {
    let (app, _) = app(ScriptedModel::replying(&["sure"]));
    let req = Request::builder()
        .method("POST")
        .uri("/ask")
        .body(Body::from(r#"{"query":"what time is it"}"#))
        .unwrap();

    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "sure");
}

#[tokio::test]
async fn test_explicit_empty_session_id_is_kept() {
    let model = ScriptedModel::replying(&["hello"]);
    let (app, state) = app(model);

    let (status, body) = send(&app, post("/ask", r#"{"query":"hi","session_id":""}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "");
    assert_eq!(state.sessions.history("").await.unwrap().len(), 2);
    assert!(state.sessions.history("default").await.is_none());
}

#[tokio::test]
async fn test_wrongly_typed_field_discards_body() {
    let model = ScriptedModel::replying(&["never"]);
    let (app, _) = app(model.clone());

    let (status, body) = send(&app, post("/ask", r#"{"query":"hi","session_id":42}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No query provided");
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_ask_upstream_failure_returns_500_and_keeps_user_turn() {
    let model = ScriptedModel::replying(&["first"]);
    model
        .replies
        .lock()
        .unwrap()
        .push_back(Err("overloaded_error: Overloaded".to_string()));
    let (app, state) = app(model.clone());

    send(&app, post("/ask", r#"{"query":"hi","session_id":"s1"}"#)).await;
    let (status, body) = send(&app, post("/ask", r#"{"query":"again","session_id":"s1"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "overloaded_error: Overloaded");
    assert_eq!(body["response"], "Sorry, I encountered an error processing that request.");

    let history = state.sessions.history("s1").await.unwrap();
    assert_eq!(
        history,
        vec![Turn::user("hi"), Turn::assistant("first"), Turn::user("again")]
    );
}

#[tokio::test]
async fn test_failed_first_call_keeps_unanswered_turn() {
    let model = ScriptedModel::failing("authentication_error: invalid x-api-key");
    let (app, state) = app(model);

    let (status, _) = send(&app, post("/ask", r#"{"query":"hi","session_id":"new"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(state.sessions.history("new").await, Some(vec![Turn::user("hi")]));
}

#[tokio::test]
async fn test_call_after_failure_sends_both_user_turns() {
    let model = ScriptedModel::failing("api_error: Internal server error");
    model.replies.lock().unwrap().push_back(Ok("ok".to_string()));
    let (app, state) = app(model.clone());

    let (status, _) = send(&app, post("/ask", r#"{"query":"first","session_id":"s"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (status, _) = send(&app, post("/ask", r#"{"query":"second","session_id":"s"}"#)).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(model.calls()[1], vec![Turn::user("first"), Turn::user("second")]);
    assert_eq!(
        state.sessions.history("s").await.unwrap(),
        vec![Turn::user("first"), Turn::user("second"), Turn::assistant("ok")]
    );
}

#[tokio::test]
async fn test_full_session_sends_overflow_turn_then_trims() {
    let model = ScriptedModel::replying(&[]);
    let (app, state) = app(model.clone());

    for i in 0..11 {
        let body = format!(r#"{{"query":"q{i}","session_id":"full"}}"#);
        send(&app, post("/ask", &body)).await;
    }

    // the eleventh call saw all 20 stored turns plus its own
    let last_call = model.calls().pop().unwrap();
    assert_eq!(last_call.len(), 21);
    assert_eq!(last_call[0], Turn::user("q0"));

    let history = state.sessions.history("full").await.unwrap();
    assert_eq!(history.len(), 20);
    assert_eq!(history[0], Turn::user("q1"));
}

#[tokio::test]
async fn test_history_grows_by_two_and_stays_bounded() {
    let model = ScriptedModel::replying(&[]);
    let (app, state) = app(model.clone());

    for i in 0..15 {
        let body = format!(r#"{{"query":"question {i}","session_id":"long"}}"#);
        let (status, _) = send(&app, post("/ask", &body)).await;
        assert_eq!(status, StatusCode::OK);

        let len = state.sessions.history("long").await.unwrap().len();
        assert_eq!(len, ((i + 1) * 2).min(20));
    }

    let history = state.sessions.history("long").await.unwrap();
    assert_eq!(history.first(), Some(&Turn::user("question 5")));
    assert_eq!(history.last(), Some(&Turn::assistant("ok")));

    for call in model.calls() {
        assert_eq!(call[0].role, MessageRole::User);
        assert!(call.len() <= 21);
    }
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let model = ScriptedModel::replying(&["a", "b"]);
    let (app, state) = app(model.clone());

    send(&app, post("/ask", r#"{"query":"kitchen","session_id":"k"}"#)).await;
    send(&app, post("/ask", r#"{"query":"garage","session_id":"g"}"#)).await;

    assert_eq!(state.sessions.history("k").await.unwrap().len(), 2);
    assert_eq!(state.sessions.history("g").await.unwrap().len(), 2);
    assert_eq!(model.calls()[1], vec![Turn::user("garage")]);
}

#[tokio::test]
async fn test_clear_resets_conversation() {
    let model = ScriptedModel::replying(&["one", "two"]);
    let (app, state) = app(model.clone());

    send(&app, post("/ask", r#"{"query":"remember me","session_id":"s1"}"#)).await;

    let (status, body) = send(&app, post("/clear", r#"{"session_id":"s1"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    let resp: ClearResponse = serde_json::from_value(body).unwrap();
    assert_eq!(resp.status, "cleared");
    assert_eq!(resp.session_id, "s1");
    assert!(state.sessions.history("s1").await.is_none());

    send(&app, post("/ask", r#"{"query":"who am I","session_id":"s1"}"#)).await;
    assert_eq!(model.calls()[1], vec![Turn::user("who am I")]);
}

#[tokio::test]
async fn test_clear_unknown_or_default_session() {
    let (app, _) = app(ScriptedModel::replying(&[]));

    let (status, body) = send(&app, post("/clear", r#"{"session_id":"ghost"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"status": "cleared", "session_id": "ghost"}));

    let (status, body) = send(&app, post("/clear", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "default");
}

#[tokio::test]
async fn test_ask_cli_requires_query() {
    let (app, _) = app(ScriptedModel::replying(&[]));

    // only `query` counts on this path
    let (status, body) = send(&app, post("/ask-cli", r#"{"text":"hello"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, serde_json::json!({"error": "No query provided"}));
}

#[cfg(unix)]
#[tokio::test]
async fn test_ask_cli_runs_tool_without_touching_sessions() {
    let model = ScriptedModel::replying(&[]);
    let (app, state) = app(model.clone());

    let (status, body) = send(&app, post("/ask-cli", r#"{"query":"ping"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"response": "-p ping --no-input", "exit_code": 0}));

    assert!(state.sessions.is_empty().await);
    assert!(model.calls().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_ask_cli_timeout_returns_504() {
    let cli = CliRunner::new("sh")
        .with_args(vec!["-c".into(), "sleep 5".into()])
        .with_timeout(Duration::from_millis(200));
    let (app, state) = app_with(ScriptedModel::replying(&[]), cli);

    let (status, body) = send(&app, post("/ask-cli", r#"{"query":"ping"}"#)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, serde_json::json!({"response": "Request timed out."}));
    assert!(state.sessions.is_empty().await);
}

#[tokio::test]
async fn test_ask_cli_missing_tool_returns_500() {
    let cli = CliRunner::new("voice-relay-no-such-tool-7f3a");
    let (app, _) = app_with(ScriptedModel::replying(&[]), cli);

    let (status, body) = send(&app, post("/ask-cli", r#"{"query":"ping"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        serde_json::json!({"response": "Claude CLI not found. Make sure it's installed."})
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _) = app(ScriptedModel::replying(&[]));
    let req = Request::builder().uri("/chat").body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
