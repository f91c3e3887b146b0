//! Chat transcript and session storage.
//!
//! This module is the consumer side of a streaming session: it provides
//! in-memory transcript storage keyed by UUID and a [`TranscriptSink`] that
//! accumulates delta text into the in-progress assistant message, switches
//! the message kind when component mode is detected, and records the backend
//! conversation id for follow-up queries.
//!
//! # Example
//!
//! ```rust
//! use snipforge::session::{Session, SessionStore};
//!
//! let store = SessionStore::new();
//! let session = store.create();
//! session.add_user_message("Hello!");
//!
//! assert_eq!(session.message_count(), 1);
//! ```

mod thread;
mod transcript;

pub use thread::{Message, MessageKind, MessageRole, STREAM_FAILURE_NOTICE, Session, SessionStore};
pub use transcript::TranscriptSink;
