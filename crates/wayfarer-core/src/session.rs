//! Session and message domain types plus the in-memory session store.
//!
//! A session is a bounded conversation context: an ordered message log, a
//! display name, and a bound model. The store is the only writer; mutations
//! on one session id are serialized through a per-session lock while
//! distinct ids proceed in parallel. Nothing is persisted across restarts.

use crate::error::SessionError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in a session. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,

    /// Reasoning trace; only assistant messages carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            reasoning: None,
        }
    }

    pub fn assistant(content: impl Into<String>, reasoning: Option<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            reasoning,
        }
    }
}

/// One conversation context keyed by an opaque identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub name: String,
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    fn new(session_id: String, name: Option<String>, model_id: String) -> Self {
        let now = Utc::now();
        let name = name.unwrap_or_else(|| format!("会话 {}", now.format("%Y-%m-%d")));
        Self {
            session_id,
            name,
            model_id,
            messages: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }

    /// Derived message count; always equals the log length.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Advance `last_active`, keeping it monotonic non-decreasing.
    fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_active {
            self.last_active = now;
        }
    }
}

/// Listing view of a session, without the message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub name: String,
    pub model_id: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(s: &Session) -> Self {
        Self {
            session_id: s.session_id.clone(),
            name: s.name.clone(),
            model_id: s.model_id.clone(),
            message_count: s.message_count(),
            created_at: s.created_at,
            last_active: s.last_active,
        }
    }
}

/// Partial update applied through [`SessionStore::update`].
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub name: Option<String>,
    pub model_id: Option<String>,
}

/// Idle threshold for the read-side listing filter.
const IDLE_THRESHOLD_SECS: i64 = 3600;

/// In-memory mapping from session id to session.
///
/// Each entry carries its own lock so mutations on one id never block
/// another. Deletion is explicit; the idle/empty rule only filters the
/// listing and never removes entries.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    default_model: String,
}

impl SessionStore {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            default_model: default_model.into(),
        }
    }

    /// Create a session with a fresh id.
    pub async fn create(&self, name: Option<String>, model_id: Option<String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.create_with_id(&id, name, model_id).await;
        id
    }

    /// Create a session under an externally supplied id.
    ///
    /// Idempotent: if the id already exists the existing session is kept
    /// unchanged (the message log is not cleared).
    pub async fn create_with_id(
        &self,
        id: &str,
        name: Option<String>,
        model_id: Option<String>,
    ) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Session::new(
                    id.to_string(),
                    name,
                    model_id.unwrap_or_else(|| self.default_model.clone()),
                )))
            })
            .clone()
    }

    async fn entry(&self, id: &str) -> Result<Arc<Mutex<Session>>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Whether the id is known.
    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Snapshot of a session.
    pub async fn get(&self, id: &str) -> Result<Session, SessionError> {
        let entry = self.entry(id).await?;
        let session = entry.lock().await;
        Ok(session.clone())
    }

    /// Apply a partial update.
    pub async fn update(&self, id: &str, patch: SessionPatch) -> Result<(), SessionError> {
        let entry = self.entry(id).await?;
        let mut session = entry.lock().await;
        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(SessionError::InvalidField("name must be non-empty".into()));
            }
            session.name = name;
        }
        if let Some(model_id) = patch.model_id {
            session.model_id = model_id;
        }
        session.touch();
        Ok(())
    }

    /// Remove a session. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// List sessions ordered by `last_active` descending.
    ///
    /// With `include_empty = false` a session is included iff it has
    /// messages or was active within the last hour.
    pub async fn list(&self, include_empty: bool) -> Vec<SessionSummary> {
        let entries: Vec<Arc<Mutex<Session>>> =
            self.sessions.read().await.values().cloned().collect();

        let now = Utc::now();
        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            let session = entry.lock().await;
            let idle = now - session.last_active;
            if include_empty
                || session.message_count() > 0
                || idle < Duration::seconds(IDLE_THRESHOLD_SECS)
            {
                summaries.push(SessionSummary::from(&*session));
            }
        }

        summaries.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        summaries
    }

    /// Append a message to the log.
    pub async fn append_message(&self, id: &str, message: ChatMessage) -> Result<(), SessionError> {
        let entry = self.entry(id).await?;
        let mut session = entry.lock().await;
        session.messages.push(message);
        session.touch();
        Ok(())
    }

    /// Clear the message log, keeping the session.
    pub async fn clear_messages(&self, id: &str) -> Result<(), SessionError> {
        let entry = self.entry(id).await?;
        let mut session = entry.lock().await;
        session.messages.clear();
        session.touch();
        Ok(())
    }

    /// Bind a model to the session.
    pub async fn set_model(&self, id: &str, model_id: impl Into<String>) -> Result<(), SessionError> {
        self.update(
            id,
            SessionPatch {
                model_id: Some(model_id.into()),
                ..Default::default()
            },
        )
        .await
    }

    /// Rename the session.
    pub async fn rename(&self, id: &str, name: impl Into<String>) -> Result<(), SessionError> {
        self.update(
            id,
            SessionPatch {
                name: Some(name.into()),
                ..Default::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new("gpt-4o-mini")
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = store();
        let id = store.create(Some("trip".into()), None).await;
        let session = store.get(&id).await.unwrap();
        assert_eq!(session.name, "trip");
        assert_eq!(session.model_id, "gpt-4o-mini");
        assert_eq!(session.message_count(), 0);
    }

    #[tokio::test]
    async fn create_with_id_is_idempotent() {
        let store = store();
        let entry = store.create_with_id("fixed", None, None).await;
        entry
            .lock()
            .await
            .messages
            .push(ChatMessage::user("第一条"));

        // Second create keeps the existing session and its log.
        store
            .create_with_id("fixed", Some("other".into()), Some("claude".into()))
            .await;
        let session = store.get("fixed").await.unwrap();
        assert_eq!(session.message_count(), 1);
        assert_eq!(session.model_id, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn message_count_matches_log() {
        let store = store();
        let id = store.create(None, None).await;
        store
            .append_message(&id, ChatMessage::user("你好"))
            .await
            .unwrap();
        store
            .append_message(&id, ChatMessage::assistant("回复", Some("想了一下".into())))
            .await
            .unwrap();

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.message_count(), session.messages.len());
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.messages[1].reasoning.as_deref(), Some("想了一下"));
    }

    #[tokio::test]
    async fn last_active_is_monotonic() {
        let store = store();
        let id = store.create(None, None).await;
        let before = store.get(&id).await.unwrap().last_active;
        store
            .append_message(&id, ChatMessage::user("hi"))
            .await
            .unwrap();
        let after = store.get(&id).await.unwrap().last_active;
        assert!(after >= before);
    }

    #[tokio::test]
    async fn list_filters_idle_empty_sessions() {
        let store = store();
        let fresh_empty = store.create(None, None).await;
        let with_messages = store.create(None, None).await;
        store
            .append_message(&with_messages, ChatMessage::user("hi"))
            .await
            .unwrap();

        // Age one empty session past the idle threshold.
        let stale_empty = store.create(None, None).await;
        {
            let entry = store.entry(&stale_empty).await.unwrap();
            let mut session = entry.lock().await;
            session.last_active = Utc::now() - Duration::seconds(IDLE_THRESHOLD_SECS + 10);
        }

        let listed = store.list(false).await;
        let ids: Vec<&str> = listed.iter().map(|s| s.session_id.as_str()).collect();
        assert!(ids.contains(&fresh_empty.as_str()));
        assert!(ids.contains(&with_messages.as_str()));
        assert!(!ids.contains(&stale_empty.as_str()));

        // include_empty lists everything.
        assert_eq!(store.list(true).await.len(), 3);
    }

    #[tokio::test]
    async fn list_ordered_by_last_active_desc() {
        let store = store();
        let first = store.create(None, None).await;
        let second = store.create(None, None).await;
        store
            .append_message(&first, ChatMessage::user("bump"))
            .await
            .unwrap();

        let listed = store.list(true).await;
        assert_eq!(listed[0].session_id, first);
        assert_eq!(listed[1].session_id, second);
    }

    #[tokio::test]
    async fn rename_rejects_blank() {
        let store = store();
        let id = store.create(None, None).await;
        let err = store.rename(&id, "   ").await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidField(_)));
    }

    #[tokio::test]
    async fn set_model_and_clear() {
        let store = store();
        let id = store.create(None, None).await;
        store.set_model(&id, "claude-sonnet").await.unwrap();
        store
            .append_message(&id, ChatMessage::user("hi"))
            .await
            .unwrap();
        store.clear_messages(&id).await.unwrap();

        let session = store.get(&id).await.unwrap();
        assert_eq!(session.model_id, "claude-sonnet");
        assert_eq!(session.message_count(), 0);
    }

    #[tokio::test]
    async fn delete_is_explicit() {
        let store = store();
        let id = store.create(None, None).await;
        assert!(store.delete(&id).await);
        assert!(!store.delete(&id).await);
        assert!(store.get(&id).await.is_err());
    }
}
