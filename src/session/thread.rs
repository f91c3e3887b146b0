//! Conversation transcript and session storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::snippet;

/// Content shown in place of a message that failed mid-stream.
pub const STREAM_FAILURE_NOTICE: &str =
    "Sorry, something went wrong while generating a response. Please try again.";

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// Rendering classification of an assistant message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Ordinary conversational text.
    #[default]
    Chat,
    /// Generated-component output.
    Component,
}

/// A single transcript message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Rendering classification.
    pub kind: MessageKind,
    /// Accumulated message text.
    pub content: String,
    /// Component code extracted from the content, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_code: Option<String>,
    /// Whether this message is still receiving deltas.
    pub streaming: bool,
    /// Message creation time.
    pub created_at: DateTime<Utc>,
}

/// A single conversation session.
///
/// Sessions maintain the transcript and the backend conversation id, and
/// provide the mutation surface used while a response streams in.
#[derive(Debug)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Unique session identifier.
    id: String,
    /// Transcript messages.
    messages: RwLock<Vec<Message>>,
    /// Backend conversation id, assigned by the server on first completion.
    conversation_id: RwLock<Option<String>>,
    /// Session creation time.
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    /// Last activity time.
    last_activity: RwLock<DateTime<Utc>>,
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Session {
    /// Create a new session with the given ID.
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(SessionInner {
                id,
                messages: RwLock::new(Vec::new()),
                conversation_id: RwLock::new(None),
                created_at: now,
                last_activity: RwLock::new(now),
            }),
        }
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Get the backend conversation id, if one has been assigned.
    #[must_use]
    pub fn conversation_id(&self) -> Option<String> {
        self.inner.conversation_id.read().unwrap().clone()
    }

    /// Record the backend conversation id from a terminal frame.
    pub fn set_conversation_id(&self, id: impl Into<String>) {
        let mut guard = self.inner.conversation_id.write().unwrap();
        *guard = Some(id.into());
        drop(guard);
        self.touch();
    }

    /// Add a user message to the transcript.
    pub fn add_user_message(&self, content: impl Into<String>) {
        let msg = Message {
            role: MessageRole::User,
            kind: MessageKind::Chat,
            content: content.into(),
            component_code: None,
            streaming: false,
            created_at: Utc::now(),
        };
        let mut guard = self.inner.messages.write().unwrap();
        guard.push(msg);
        drop(guard);
        self.touch();
    }

    /// Begin an empty streaming assistant message.
    ///
    /// All `*_live` methods operate on this message until it is finished or
    /// failed; they are no-ops when no message is streaming.
    pub fn begin_assistant_message(&self) {
        let msg = Message {
            role: MessageRole::Assistant,
            kind: MessageKind::Chat,
            content: String::new(),
            component_code: None,
            streaming: true,
            created_at: Utc::now(),
        };
        let mut guard = self.inner.messages.write().unwrap();
        guard.push(msg);
        drop(guard);
        self.touch();
    }

    /// Append a delta to the streaming assistant message.
    pub fn append_live(&self, text: &str) {
        let mut guard = self.inner.messages.write().unwrap();
        if let Some(msg) = guard.last_mut().filter(|m| m.streaming) {
            msg.content.push_str(text);
        }
        drop(guard);
        self.touch();
    }

    /// Mark the streaming assistant message as generated-component output.
    pub fn mark_live_component(&self) {
        let mut guard = self.inner.messages.write().unwrap();
        if let Some(msg) = guard.last_mut().filter(|m| m.streaming) {
            msg.kind = MessageKind::Component;
        }
    }

    /// Complete the streaming assistant message.
    ///
    /// Extracts a component snippet from the accumulated content when one is
    /// present; a component-mode message without explicit markers uses its
    /// whole content as the code.
    pub fn finish_live(&self) {
        let mut guard = self.inner.messages.write().unwrap();
        if let Some(msg) = guard.last_mut().filter(|m| m.streaming) {
            msg.streaming = false;
            msg.component_code = match snippet::extract_component(&msg.content) {
                Some(code) => Some(code),
                None if msg.kind == MessageKind::Component && !msg.content.trim().is_empty() => {
                    Some(msg.content.trim().to_string())
                }
                None => None,
            };
        }
        drop(guard);
        self.touch();
    }

    /// Replace the streaming assistant message with a failure notice.
    pub fn fail_live(&self) {
        let mut guard = self.inner.messages.write().unwrap();
        if let Some(msg) = guard.last_mut().filter(|m| m.streaming) {
            msg.streaming = false;
            msg.kind = MessageKind::Chat;
            msg.content = STREAM_FAILURE_NOTICE.to_string();
            msg.component_code = None;
        }
        drop(guard);
        self.touch();
    }

    /// Get all messages in the transcript.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner.messages.read().unwrap().clone()
    }

    /// Get the number of messages in the transcript.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.inner.messages.read().unwrap().len()
    }

    /// Get the most recent user message, if any.
    #[must_use]
    pub fn last_user_message(&self) -> Option<String> {
        self.inner
            .messages
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
    }

    /// Update the last activity timestamp.
    fn touch(&self) {
        let mut guard = self.inner.last_activity.write().unwrap();
        *guard = Utc::now();
    }
}

/// Thread-safe store for sessions.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

#[derive(Debug)]
struct SessionStoreInner {
    sessions: RwLock<HashMap<String, Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create a new session store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Create a new session and return it.
    #[must_use]
    pub fn create(&self) -> Session {
        let id = Uuid::new_v4().to_string();
        self.create_with_id(id)
    }

    /// Create a new session with a specific ID.
    #[must_use]
    pub fn create_with_id(&self, id: impl Into<String>) -> Session {
        let id = id.into();
        let session = Session::new(id.clone());
        let mut guard = self.inner.sessions.write().unwrap();
        guard.insert(id, session.clone());
        session
    }

    /// Get a session by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        let guard = self.inner.sessions.read().unwrap();
        guard.get(id).cloned()
    }

    /// Get a session by ID, creating it if it doesn't exist.
    #[must_use]
    pub fn get_or_create(&self, id: &str) -> Session {
        // Try read-only first
        {
            let guard = self.inner.sessions.read().unwrap();
            if let Some(session) = guard.get(id) {
                return session.clone();
            }
        }

        self.create_with_id(id)
    }

    /// Remove a session by ID.
    pub fn remove(&self, id: &str) -> Option<Session> {
        let mut guard = self.inner.sessions.write().unwrap();
        guard.remove(id)
    }

    /// Get the number of active sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.sessions.read().unwrap().len()
    }

    /// Check if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let session = Session::new("test-123".to_string());

        assert_eq!(session.id(), "test-123");
        assert_eq!(session.message_count(), 0);

        session.add_user_message("Hello");
        assert_eq!(session.message_count(), 1);
        assert_eq!(session.last_user_message().as_deref(), Some("Hello"));

        session.begin_assistant_message();
        session.append_live("Hi ");
        session.append_live("there!");
        session.finish_live();

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "Hi there!");
        assert!(!messages[1].streaming);
    }

    #[test]
    fn test_live_methods_noop_without_streaming_message() {
        let session = Session::new("test".to_string());
        session.add_user_message("Hello");

        session.append_live("ignored");
        session.finish_live();

        let messages = session.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Hello");
    }

    #[test]
    fn test_component_message_keeps_extracted_code() {
        let session = Session::new("test".to_string());
        session.begin_assistant_message();
        session.mark_live_component();
        session.append_live("export default function Badge() { return <span/> }");
        session.finish_live();

        let messages = session.messages();
        assert_eq!(messages[0].kind, MessageKind::Component);
        assert_eq!(
            messages[0].component_code.as_deref(),
            Some("export default function Badge() { return <span/> }")
        );
    }

    #[test]
    fn test_chat_message_with_markers_extracts_code() {
        let session = Session::new("test".to_string());
        session.begin_assistant_message();
        session.append_live("Here you go:\n[component]\nfunction A() { return 1 }\n[/component]");
        session.finish_live();

        let messages = session.messages();
        assert_eq!(messages[0].kind, MessageKind::Chat);
        assert_eq!(
            messages[0].component_code.as_deref(),
            Some("function A() { return 1 }")
        );
    }

    #[test]
    fn test_fail_live_replaces_content() {
        let session = Session::new("test".to_string());
        session.begin_assistant_message();
        session.mark_live_component();
        session.append_live("partial out");
        session.fail_live();

        let messages = session.messages();
        assert_eq!(messages[0].content, STREAM_FAILURE_NOTICE);
        assert_eq!(messages[0].kind, MessageKind::Chat);
        assert!(!messages[0].streaming);
        assert!(messages[0].component_code.is_none());
    }

    #[test]
    fn test_conversation_id_roundtrip() {
        let session = Session::new("test".to_string());
        assert!(session.conversation_id().is_none());
        session.set_conversation_id("c1");
        assert_eq!(session.conversation_id().as_deref(), Some("c1"));
    }

    #[test]
    fn test_session_store() {
        let store = SessionStore::new();

        assert!(store.is_empty());

        let session = store.create();
        assert_eq!(store.len(), 1);

        let retrieved = store.get(session.id()).unwrap();
        assert_eq!(retrieved.id(), session.id());

        store.remove(session.id());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_or_create() {
        let store = SessionStore::new();
        let first = store.get_or_create("abc");
        first.add_user_message("hi");

        let second = store.get_or_create("abc");
        assert_eq!(second.message_count(), 1);
        assert_eq!(store.len(), 1);
    }
}
