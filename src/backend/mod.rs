//! Conversational backend protocol types and streaming client.
//!
//! The backend is a Dify-style chat-completion API: a streaming POST to
//! `/chat-messages` answered by a sequence of server-sent-event frames, each
//! carrying a JSON payload with an `event` discriminator and an `answer`
//! fragment. The terminal `message_end` frame additionally carries the
//! server-assigned `conversation_id`.
//!
//! # Modules
//!
//! - [`client`]: the [`BackendClient`] that issues the streaming POST and
//!   decodes incoming frames.

pub mod client;

pub use client::BackendClient;

use serde::{Deserialize, Serialize};

/// Backend connection settings.
#[derive(Clone)]
pub struct BackendSettings {
    /// Base URL for the backend API (e.g. `https://api.dify.ai/v1`).
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
    /// End-user identifier included in every request.
    pub user: String,
}

impl std::fmt::Debug for BackendSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSettings")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .finish()
    }
}

/// Event discriminator carried by every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameEvent {
    /// Incremental assistant output.
    Message,
    /// Terminal frame; carries the conversation id.
    MessageEnd,
    /// Any other event kind. Ignored by the session.
    #[default]
    #[serde(other)]
    Other,
}

/// One decoded event from the streaming response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Event discriminator.
    #[serde(default)]
    pub event: FrameEvent,
    /// Answer fragment (text delta). Absent on some frame kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Conversation id, present only on the terminal frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl Frame {
    /// Convenience constructor for a `message` frame.
    #[must_use]
    pub fn message(answer: impl Into<String>) -> Self {
        Self {
            event: FrameEvent::Message,
            answer: Some(answer.into()),
            conversation_id: None,
        }
    }

    /// Convenience constructor for the terminal `message_end` frame.
    #[must_use]
    pub fn message_end(conversation_id: impl Into<String>) -> Self {
        Self {
            event: FrameEvent::MessageEnd,
            answer: None,
            conversation_id: Some(conversation_id.into()),
        }
    }
}

/// Errors surfaced by a streaming session.
///
/// Every variant terminates the session it occurred in; errors are local to
/// one session and never corrupt state of subsequent sessions. There is no
/// internal retry — retrying is a caller decision.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Network failure or non-2xx response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Malformed frame payload.
    #[error("malformed frame payload: {0}")]
    Decode(#[from] serde_json::Error),
    /// The stream closed before a `message_end` frame arrived.
    #[error("stream closed before message_end")]
    PrematureClose,
    /// The session was aborted by the caller.
    #[error("session cancelled")]
    Cancelled,
}

impl StreamError {
    /// Stable machine-readable code for wire encoding.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::PrematureClose => "premature_close",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_frame_decode() {
        let frame: Frame = serde_json::from_str(r#"{"event":"message","answer":"Hello"}"#).unwrap();
        assert_eq!(frame.event, FrameEvent::Message);
        assert_eq!(frame.answer.as_deref(), Some("Hello"));
        assert!(frame.conversation_id.is_none());
    }

    #[test]
    fn test_terminal_frame_decode() {
        let frame: Frame =
            serde_json::from_str(r#"{"event":"message_end","conversation_id":"c1"}"#).unwrap();
        assert_eq!(frame.event, FrameEvent::MessageEnd);
        assert_eq!(frame.conversation_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_unknown_event_kind_decodes_as_other() {
        let frame: Frame =
            serde_json::from_str(r#"{"event":"message_replace","answer":"x"}"#).unwrap();
        assert_eq!(frame.event, FrameEvent::Other);
    }

    #[test]
    fn test_missing_event_defaults_to_other() {
        let frame: Frame = serde_json::from_str(r#"{"answer":"x"}"#).unwrap();
        assert_eq!(frame.event, FrameEvent::Other);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(StreamError::PrematureClose.code(), "premature_close");
        assert_eq!(StreamError::Cancelled.code(), "cancelled");
    }

    #[test]
    fn test_settings_debug_hides_api_key() {
        let settings = BackendSettings {
            base_url: "http://localhost".to_string(),
            api_key: "secret".to_string(),
            user: "demo-user".to_string(),
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("secret"));
    }
}
