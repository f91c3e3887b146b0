//! Streaming session core.
//!
//! A [`StreamSession`] is the adapter between the backend's event stream and
//! a consumer: it opens one streaming exchange, classifies the session as
//! chat or component mode from the first non-empty `message` frame, and
//! delivers incremental text, the server-assigned conversation id, completion
//! and errors to a caller-supplied [`StreamSink`].
//!
//! # Event model
//!
//! Internally the session is a stream of tagged [`SessionEvent`]s produced by
//! [`session_events`]; [`drive`] pumps that stream into the sink callbacks
//! and handles cancellation. Ordering is preserved and the terminal event
//! (`Done` or an error) is delivered at most once per session.
//!
//! # Example
//!
//! ```rust
//! use snipforge::stream::{SessionEvent, sse_event};
//!
//! let event = SessionEvent::Delta { text: "Hello".to_string() };
//! let sse = sse_event(&event);
//! assert!(sse.contains("message.delta"));
//! ```

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendClient, Frame, FrameEvent, StreamError};

/// Reserved answer value that switches a session into component mode.
///
/// When the first non-empty `message` frame carries exactly this text it is a
/// control signal, not content: the sink is notified and the fragment is
/// never forwarded as a delta.
pub const COMPONENT_SENTINEL: &str = "@component";

/// Classification of a session's output, decided once per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionMode {
    /// No non-empty `message` frame has been seen yet.
    #[default]
    Undecided,
    /// Ordinary conversational output.
    Chat,
    /// Generated-component output.
    Component,
}

impl SessionMode {
    /// Whether the mode decision is still pending.
    #[must_use]
    pub fn is_undecided(self) -> bool {
        self == Self::Undecided
    }

    /// Decide the mode from the first non-empty `message` answer.
    ///
    /// Returns `true` when the answer is the component sentinel. The
    /// transition happens exactly once; callers guard on
    /// [`SessionMode::is_undecided`].
    fn classify(&mut self, answer: &str) -> bool {
        debug_assert!(self.is_undecided());
        if answer == COMPONENT_SENTINEL {
            *self = Self::Component;
            true
        } else {
            *self = Self::Chat;
            false
        }
    }
}

/// Events emitted by a streaming session, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    /// Incremental text delta to append to the in-progress message.
    #[serde(rename = "message.delta")]
    Delta {
        /// The text fragment to append. Empty if the frame carried none.
        text: String,
    },

    /// Server-assigned conversation id from the terminal frame.
    #[serde(rename = "conversation.id")]
    ConversationId {
        /// The conversation id to reuse on follow-up queries.
        id: String,
    },

    /// The first frame carried the component sentinel; the consumer should
    /// switch message rendering into component mode.
    #[serde(rename = "component.detected")]
    ComponentModeDetected,

    /// The session completed normally.
    #[serde(rename = "done")]
    Done,
}

/// Consumer of one streaming session.
///
/// The five callbacks mirror the session lifecycle: zero or more `on_delta`
/// calls in arrival order, then either `on_conversation_id` + `on_done` on
/// normal completion or exactly one `on_error`. `on_component_mode_detected`
/// fires at most once, before any delta of the component body.
pub trait StreamSink: Send {
    /// An incremental text fragment arrived.
    fn on_delta(&mut self, text: &str);
    /// The terminal frame carried this conversation id.
    fn on_conversation_id(&mut self, id: &str);
    /// The session switched into component mode.
    fn on_component_mode_detected(&mut self);
    /// The session completed normally.
    fn on_done(&mut self);
    /// The session terminated with an error. No further callbacks follow.
    fn on_error(&mut self, err: StreamError);
}

/// Translate a frame stream into session events.
///
/// Applies the mode state machine to the raw frames:
///
/// - the first non-empty `message` frame decides the mode; the sentinel is
///   suppressed and surfaced as [`SessionEvent::ComponentModeDetected`];
/// - every other `message` frame becomes a [`SessionEvent::Delta`] (empty
///   string if the frame carried no answer);
/// - `message_end` surfaces the conversation id, then `Done`, and stops
///   processing;
/// - other event kinds are ignored;
/// - a stream that ends without `message_end` yields
///   [`StreamError::PrematureClose`].
pub fn session_events<F>(frames: F) -> impl Stream<Item = Result<SessionEvent, StreamError>>
where
    F: Stream<Item = Result<Frame, StreamError>>,
{
    async_stream::try_stream! {
        let mut mode = SessionMode::default();
        let mut completed = false;

        futures::pin_mut!(frames);
        while let Some(frame) = frames.next().await {
            let frame = frame?;
            match frame.event {
                FrameEvent::Message => {
                    let answer = frame.answer.unwrap_or_default();
                    if mode.is_undecided() && !answer.is_empty() && mode.classify(&answer) {
                        // Control signal, not content.
                        yield SessionEvent::ComponentModeDetected;
                        continue;
                    }
                    yield SessionEvent::Delta { text: answer };
                }
                FrameEvent::MessageEnd => {
                    if let Some(id) = frame.conversation_id {
                        yield SessionEvent::ConversationId { id };
                    }
                    completed = true;
                    yield SessionEvent::Done;
                    break;
                }
                FrameEvent::Other => {}
            }
        }

        if !completed {
            Err(StreamError::PrematureClose)?;
        }
    }
}

/// Pump session events into a sink until completion, error, or cancellation.
///
/// Cancellation stops further callback invocations and drops the underlying
/// frame stream (releasing the transport); the sink observes exactly one
/// [`StreamError::Cancelled`].
pub async fn drive<F, S>(frames: F, cancel: CancellationToken, sink: &mut S)
where
    F: Stream<Item = Result<Frame, StreamError>>,
    S: StreamSink + ?Sized,
{
    let events = session_events(frames);
    futures::pin_mut!(events);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                sink.on_error(StreamError::Cancelled);
                return;
            }
            next = events.next() => match next {
                Some(Ok(SessionEvent::Delta { text })) => sink.on_delta(&text),
                Some(Ok(SessionEvent::ConversationId { id })) => sink.on_conversation_id(&id),
                Some(Ok(SessionEvent::ComponentModeDetected)) => sink.on_component_mode_detected(),
                Some(Ok(SessionEvent::Done)) => {
                    sink.on_done();
                    return;
                }
                Some(Err(err)) => {
                    sink.on_error(err);
                    return;
                }
                None => return,
            }
        }
    }
}

/// One query-to-completion streaming exchange with the backend.
///
/// Sessions are created per user-submitted query and owned exclusively by
/// the call site; all mode state lives inside the single session task.
#[derive(Debug, Clone)]
pub struct StreamSession {
    client: BackendClient,
}

impl StreamSession {
    /// Create a session factory over the given client.
    #[must_use]
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Open one streaming exchange and deliver it to the sink.
    ///
    /// All outcomes, including the failure to open the transport, are
    /// reported through the sink; there is no internal retry.
    pub async fn open<S>(
        &self,
        query: &str,
        conversation_id: Option<&str>,
        cancel: CancellationToken,
        sink: &mut S,
    ) where
        S: StreamSink + ?Sized,
    {
        let frames = match self.client.stream(query, conversation_id).await {
            Ok(frames) => frames,
            Err(err) => {
                sink.on_error(err);
                return;
            }
        };

        drive(frames, cancel, sink).await;
    }
}

/// Convert a [`SessionEvent`] to an SSE-formatted string.
///
/// The output follows the Server-Sent Events specification with both an
/// `event:` line (for EventSource listeners) and a `data:` line containing
/// the JSON payload.
pub fn sse_event(evt: &SessionEvent) -> String {
    let json = serde_json::to_string(evt).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "data": { "message": e.to_string() } }).to_string()
    });

    format!("event: {}\ndata: {json}\n\n", event_name(evt))
}

/// Get the SSE event name for a [`SessionEvent`].
pub fn event_name(evt: &SessionEvent) -> &'static str {
    match evt {
        SessionEvent::Delta { .. } => "message.delta",
        SessionEvent::ConversationId { .. } => "conversation.id",
        SessionEvent::ComponentModeDetected => "component.detected",
        SessionEvent::Done => "done",
    }
}

/// Convert a [`StreamError`] to an SSE-formatted `error` event.
pub fn error_sse_event(err: &StreamError) -> String {
    let json = serde_json::json!({
        "type": "error",
        "data": { "message": err.to_string(), "code": err.code() },
    });
    format!("event: error\ndata: {json}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[derive(Debug, Default)]
    struct Recording {
        deltas: Vec<String>,
        conversation_ids: Vec<String>,
        component_detected: usize,
        done: usize,
        errors: Vec<String>,
    }

    impl StreamSink for Recording {
        fn on_delta(&mut self, text: &str) {
            self.deltas.push(text.to_string());
        }
        fn on_conversation_id(&mut self, id: &str) {
            self.conversation_ids.push(id.to_string());
        }
        fn on_component_mode_detected(&mut self) {
            self.component_detected += 1;
        }
        fn on_done(&mut self) {
            self.done += 1;
        }
        fn on_error(&mut self, err: StreamError) {
            self.errors.push(err.code().to_string());
        }
    }

    fn frames(frames: Vec<Frame>) -> impl Stream<Item = Result<Frame, StreamError>> {
        stream::iter(frames.into_iter().map(Ok))
    }

    #[tokio::test]
    async fn test_deltas_delivered_in_arrival_order() {
        let mut sink = Recording::default();
        drive(
            frames(vec![
                Frame::message("Hello"),
                Frame::message(" world"),
                Frame::message_end("c1"),
            ]),
            CancellationToken::new(),
            &mut sink,
        )
        .await;

        assert_eq!(sink.deltas, vec!["Hello", " world"]);
        assert_eq!(sink.conversation_ids, vec!["c1"]);
        assert_eq!(sink.done, 1);
        assert_eq!(sink.component_detected, 0);
        assert!(sink.errors.is_empty());
    }

    #[tokio::test]
    async fn test_sentinel_first_frame_switches_mode_and_is_suppressed() {
        let mut sink = Recording::default();
        drive(
            frames(vec![
                Frame::message(COMPONENT_SENTINEL),
                Frame::message("fn Button() {"),
                Frame::message("}"),
                Frame::message_end("c2"),
            ]),
            CancellationToken::new(),
            &mut sink,
        )
        .await;

        assert_eq!(sink.component_detected, 1);
        assert_eq!(sink.deltas, vec!["fn Button() {", "}"]);
        assert_eq!(sink.done, 1);
    }

    #[tokio::test]
    async fn test_sentinel_on_later_frame_is_ordinary_text() {
        let mut sink = Recording::default();
        drive(
            frames(vec![
                Frame::message("Hi"),
                Frame::message(COMPONENT_SENTINEL),
                Frame::message_end("c3"),
            ]),
            CancellationToken::new(),
            &mut sink,
        )
        .await;

        assert_eq!(sink.component_detected, 0);
        assert_eq!(sink.deltas, vec!["Hi", COMPONENT_SENTINEL]);
    }

    #[tokio::test]
    async fn test_empty_answer_does_not_consume_classification() {
        let mut sink = Recording::default();
        drive(
            frames(vec![
                Frame {
                    event: FrameEvent::Message,
                    answer: None,
                    conversation_id: None,
                },
                Frame::message(COMPONENT_SENTINEL),
                Frame::message("code"),
                Frame::message_end("c4"),
            ]),
            CancellationToken::new(),
            &mut sink,
        )
        .await;

        // The empty frame is forwarded as an empty delta; the sentinel on the
        // first non-empty frame still decides the mode.
        assert_eq!(sink.deltas, vec!["", "code"]);
        assert_eq!(sink.component_detected, 1);
    }

    #[tokio::test]
    async fn test_other_event_kinds_are_ignored() {
        let mut sink = Recording::default();
        drive(
            frames(vec![
                Frame {
                    event: FrameEvent::Other,
                    answer: Some("noise".to_string()),
                    conversation_id: None,
                },
                Frame::message("Hello"),
                Frame::message_end("c5"),
            ]),
            CancellationToken::new(),
            &mut sink,
        )
        .await;

        assert_eq!(sink.deltas, vec!["Hello"]);
        assert_eq!(sink.done, 1);
    }

    #[tokio::test]
    async fn test_stream_end_without_message_end_is_an_error() {
        let mut sink = Recording::default();
        drive(
            frames(vec![Frame::message("partial")]),
            CancellationToken::new(),
            &mut sink,
        )
        .await;

        assert_eq!(sink.deltas, vec!["partial"]);
        assert_eq!(sink.done, 0);
        assert_eq!(sink.errors, vec!["premature_close"]);
    }

    #[tokio::test]
    async fn test_decode_error_stops_processing() {
        let bad: Result<Frame, StreamError> =
            Err(serde_json::from_str::<Frame>("not json").unwrap_err().into());
        let mut sink = Recording::default();
        drive(
            stream::iter(vec![
                Ok(Frame::message("Hello")),
                bad,
                Ok(Frame::message("never")),
            ]),
            CancellationToken::new(),
            &mut sink,
        )
        .await;

        assert_eq!(sink.deltas, vec!["Hello"]);
        assert_eq!(sink.errors, vec!["decode"]);
        assert_eq!(sink.done, 0);
    }

    #[tokio::test]
    async fn test_frames_after_message_end_are_not_processed() {
        let mut sink = Recording::default();
        drive(
            frames(vec![
                Frame::message("Hello"),
                Frame::message_end("c6"),
                Frame::message("late"),
            ]),
            CancellationToken::new(),
            &mut sink,
        )
        .await;

        assert_eq!(sink.deltas, vec!["Hello"]);
        assert_eq!(sink.done, 1);
    }

    #[tokio::test]
    async fn test_cancel_before_any_frame() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut sink = Recording::default();
        drive(
            stream::pending::<Result<Frame, StreamError>>(),
            cancel,
            &mut sink,
        )
        .await;

        assert!(sink.deltas.is_empty());
        assert_eq!(sink.done, 0);
        assert_eq!(sink.errors, vec!["cancelled"]);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_stops_callbacks() {
        use tokio::sync::mpsc;

        #[derive(Debug)]
        struct ChannelSink(mpsc::UnboundedSender<String>);

        impl StreamSink for ChannelSink {
            fn on_delta(&mut self, text: &str) {
                let _ = self.0.send(format!("delta:{text}"));
            }
            fn on_conversation_id(&mut self, id: &str) {
                let _ = self.0.send(format!("conversation:{id}"));
            }
            fn on_component_mode_detected(&mut self) {
                let _ = self.0.send("component".to_string());
            }
            fn on_done(&mut self) {
                let _ = self.0.send("done".to_string());
            }
            fn on_error(&mut self, err: StreamError) {
                let _ = self.0.send(format!("error:{}", err.code()));
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let mut sink = ChannelSink(tx);
            let frames = stream::iter(vec![Ok(Frame::message("Hello"))]).chain(stream::pending());
            drive(frames, task_cancel, &mut sink).await;
        });

        assert_eq!(rx.recv().await.as_deref(), Some("delta:Hello"));
        cancel.cancel();
        assert_eq!(rx.recv().await.as_deref(), Some("error:cancelled"));
        // Channel closes once drive returns; no further callbacks fire.
        assert!(rx.recv().await.is_none());
        task.await.unwrap();
    }

    #[test]
    fn test_mode_transition() {
        let mut mode = SessionMode::default();
        assert!(mode.is_undecided());
        assert!(!mode.classify("hello"));
        assert_eq!(mode, SessionMode::Chat);

        let mut mode = SessionMode::default();
        assert!(mode.classify(COMPONENT_SENTINEL));
        assert_eq!(mode, SessionMode::Component);
    }

    #[test]
    fn test_sse_event_format() {
        let sse = sse_event(&SessionEvent::Done);
        assert!(sse.starts_with("event: done\n"));
        assert!(sse.contains("data: "));
        assert!(sse.ends_with("\n\n"));
    }

    #[test]
    fn test_delta_serialization() {
        let json = serde_json::to_string(&SessionEvent::Delta {
            text: "Hello".to_string(),
        })
        .unwrap();
        assert!(json.contains("message.delta"));
        assert!(json.contains("Hello"));
    }

    #[test]
    fn test_error_sse_event_carries_code() {
        let sse = error_sse_event(&StreamError::PrematureClose);
        assert!(sse.starts_with("event: error\n"));
        assert!(sse.contains("premature_close"));
    }
}
