//! Transcript-backed stream sink.

use crate::backend::StreamError;
use crate::stream::StreamSink;

use super::Session;

/// [`StreamSink`] that accumulates a streaming response into a session's
/// in-progress assistant message.
///
/// On error the in-progress content is replaced with a generic failure
/// notice and the streaming indicator is cleared.
#[derive(Debug, Clone)]
pub struct TranscriptSink {
    session: Session,
}

impl TranscriptSink {
    /// Create a sink writing into the given session.
    ///
    /// The caller is expected to have begun a streaming assistant message
    /// via [`Session::begin_assistant_message`].
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// The session this sink writes into.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl StreamSink for TranscriptSink {
    fn on_delta(&mut self, text: &str) {
        self.session.append_live(text);
    }

    fn on_conversation_id(&mut self, id: &str) {
        self.session.set_conversation_id(id);
    }

    fn on_component_mode_detected(&mut self) {
        self.session.mark_live_component();
    }

    fn on_done(&mut self) {
        self.session.finish_live();
    }

    fn on_error(&mut self, err: StreamError) {
        tracing::error!(
            session_id = %self.session.id(),
            error = %err,
            code = err.code(),
            "Streaming session failed"
        );
        self.session.fail_live();
    }
}
