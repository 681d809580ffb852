//! In-memory conversation history, keyed by session id.

use std::{collections::HashMap, collections::VecDeque, fmt::Debug, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One message of a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: MessageRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

/// Bounded transcript of a single session.
#[derive(Debug)]
pub struct Conversation {
    turns: VecDeque<Turn>,
    limit: usize,
}

impl Conversation {
    pub fn new(limit: usize) -> Self {
        Self { turns: VecDeque::new(), limit: limit.max(1) }
    }

    /// Append a turn and trim the oldest ones past the limit. Returns the new length.
    pub fn push(&mut self, turn: Turn) -> usize {
        self.record(turn);
        self.trim()
    }

    /// Append a turn without trimming. The next `push` brings the length back
    /// under the limit.
    pub fn record(&mut self, turn: Turn) -> usize {
        self.turns.push_back(turn);
        self.turns.len()
    }

    fn trim(&mut self) -> usize {
        while self.turns.len() > self.limit {
            self.turns.pop_front();
        }
        self.turns.len()
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

pub type SessionHandle = Arc<Mutex<Conversation>>;

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<RwLock<HashMap<String, SessionHandle>>>,
    history_limit: usize,
}

impl Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl SessionManager {
    pub fn new(history_limit: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            history_limit,
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Lockable handle to a session's conversation, created on first use.
    ///
    /// Holding the lock serializes every update to that one session; other
    /// sessions are unaffected.
    pub async fn session(&self, session_id: &str) -> SessionHandle {
        {
            let guard = self.inner.read().await;
            if let Some(handle) = guard.get(session_id) {
                return handle.clone();
            }
        }
        let mut guard = self.inner.write().await;
        guard
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Conversation::new(self.history_limit))))
            .clone()
    }

    /// Current turns of a session, creating an empty one if needed.
    pub async fn get_or_create(&self, session_id: &str) -> Vec<Turn> {
        self.session(session_id).await.lock().await.turns()
    }

    /// Append a turn to a session's history. Returns the length after trimming.
    pub async fn append(&self, session_id: &str, turn: Turn) -> usize {
        self.session(session_id).await.lock().await.push(turn)
    }

    /// Snapshot of a session's history without creating it.
    pub async fn history(&self, session_id: &str) -> Option<Vec<Turn>> {
        let handle = self.inner.read().await.get(session_id).cloned()?;
        let turns = handle.lock().await.turns();
        Some(turns)
    }

    /// Remove a session by id. Returns whether it existed.
    pub async fn clear(&self, session_id: &str) -> bool {
        let mut guard = self.inner.write().await;
        guard.remove(session_id).is_some()
    }

    /// Number of sessions
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
