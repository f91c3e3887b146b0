//! HTTP API surface.
//!
//! Chat submission is split in two for EventSource compatibility: a POST
//! records the user message and hands back a stream URL, then a GET on that
//! URL opens the SSE response. Streaming responses are written into the
//! session transcript and forwarded to the wire at the same time.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::backend::StreamError;
use crate::catalog::NewComponent;
use crate::session::{Message, MessageKind, MessageRole, TranscriptSink};
use crate::snippet;
use crate::stream::{self, SessionEvent, StreamSession, StreamSink};

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(api_chat))
        .route("/api/chat/stream", get(api_chat_stream))
        .route("/api/sessions/{id}/messages", get(api_session_messages))
        .route(
            "/api/components",
            get(api_list_components).post(api_save_component),
        )
        .route(
            "/api/components/{id}",
            get(api_get_component).delete(api_delete_component),
        )
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB limit
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatBody {
    message: String,
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatAccepted {
    session_id: String,
    stream_url: String,
}

/// POST /api/chat - Record a user message and return the stream URL.
async fn api_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatAccepted>, Response> {
    if body.message.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "message is empty"));
    }

    let session = match &body.session_id {
        Some(id) => state.sessions.get_or_create(id),
        None => state.sessions.create(),
    };
    session.add_user_message(&body.message);

    tracing::info!(session_id = %session.id(), "Accepted chat message");

    let session_id = session.id().to_string();
    let stream_url = format!("/api/chat/stream?session_id={session_id}");
    Ok(Json(ChatAccepted {
        session_id,
        stream_url,
    }))
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    session_id: String,
}

/// GET /api/chat/stream - SSE stream for the pending chat message.
async fn api_chat_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Response {
    tracing::info!(session_id = %query.session_id, "Starting SSE stream");

    let Some(session) = state.sessions.get(&query.session_id) else {
        tracing::error!(session_id = %query.session_id, "Session not found");
        return single_error_sse("Session not found");
    };
    let Some(message) = session.last_user_message() else {
        tracing::error!(session_id = %query.session_id, "No pending message");
        return single_error_sse("No message to answer");
    };

    session.begin_assistant_message();
    let conversation_id = session.conversation_id();

    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let mut sink = SseBridge {
        transcript: TranscriptSink::new(session),
        tx,
        cancel: cancel.clone(),
    };

    let streams = StreamSession::new(state.backend.clone());
    tokio::spawn(async move {
        streams
            .open(&message, conversation_id.as_deref(), cancel, &mut sink)
            .await;
    });

    let body = Body::from_stream(UnboundedReceiverStream::new(rx));
    build_sse_response(body)
}

/// Sink that mirrors session events to the transcript and the SSE wire.
///
/// A failed channel send means the client disconnected; the cancellation
/// token then tears down the backend exchange.
#[derive(Debug)]
struct SseBridge {
    transcript: TranscriptSink,
    tx: mpsc::UnboundedSender<Result<String, Infallible>>,
    cancel: CancellationToken,
}

impl SseBridge {
    fn send(&self, payload: String) {
        if self.tx.send(Ok(payload)).is_err() {
            self.cancel.cancel();
        }
    }
}

impl StreamSink for SseBridge {
    fn on_delta(&mut self, text: &str) {
        self.transcript.on_delta(text);
        self.send(stream::sse_event(&SessionEvent::Delta {
            text: text.to_string(),
        }));
    }

    fn on_conversation_id(&mut self, id: &str) {
        self.transcript.on_conversation_id(id);
        self.send(stream::sse_event(&SessionEvent::ConversationId {
            id: id.to_string(),
        }));
    }

    fn on_component_mode_detected(&mut self) {
        self.transcript.on_component_mode_detected();
        self.send(stream::sse_event(&SessionEvent::ComponentModeDetected));
    }

    fn on_done(&mut self) {
        self.transcript.on_done();
        self.send(stream::sse_event(&SessionEvent::Done));
    }

    fn on_error(&mut self, err: StreamError) {
        let payload = format!(
            "{}{}",
            stream::error_sse_event(&err),
            stream::sse_event(&SessionEvent::Done)
        );
        self.transcript.on_error(err);
        self.send(payload);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessageView {
    role: MessageRole,
    kind: MessageKind,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    component_code: Option<String>,
}

impl From<Message> for MessageView {
    fn from(msg: Message) -> Self {
        Self {
            role: msg.role,
            kind: msg.kind,
            content: msg.content,
            component_code: msg.component_code,
        }
    }
}

/// GET /api/sessions/{id}/messages - Transcript of a session.
async fn api_session_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageView>>, Response> {
    let session = state
        .sessions
        .get(&id)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Session not found"))?;

    let messages = session
        .messages()
        .into_iter()
        .map(MessageView::from)
        .collect();
    Ok(Json(messages))
}

// ─────────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────────

/// GET /api/components - List the component catalog.
async fn api_list_components(State(state): State<AppState>) -> Response {
    match state.catalog.list().await {
        Ok(components) => Json(components).into_response(),
        Err(err) => internal_error(&err),
    }
}

/// POST /api/components - Validate and save a component.
async fn api_save_component(
    State(state): State<AppState>,
    Json(mut component): Json<NewComponent>,
) -> Response {
    let validation = snippet::validate_component(&component.code);
    if !validation.is_valid {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "errors": validation.errors })),
        )
            .into_response();
    }

    // Name omitted by the client falls back to the definition in the code.
    if component.name.trim().is_empty() {
        let parsed = snippet::parse_component(&component.code);
        component.name = parsed.name.unwrap_or_else(|| "Component".to_string());
    }

    match state.catalog.save(component).await {
        Ok(record) => {
            tracing::info!(component_id = %record.id, name = %record.name, "Saved component");
            (StatusCode::CREATED, Json(record)).into_response()
        }
        Err(err) => internal_error(&err),
    }
}

/// GET /api/components/{id} - Fetch one component.
async fn api_get_component(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.catalog.get(&id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Component not found"),
        Err(err) => internal_error(&err),
    }
}

/// DELETE /api/components/{id} - Delete one component.
async fn api_delete_component(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.catalog.delete(&id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Component not found"),
        Err(err) => internal_error(&err),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn internal_error(err: &anyhow::Error) -> Response {
    tracing::error!(error = %err, "Catalog operation failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

fn single_error_sse(message: &str) -> Response {
    let json = serde_json::json!({
        "type": "error",
        "data": { "message": message },
    });
    let payload = format!(
        "event: error\ndata: {json}\n\n{}",
        stream::sse_event(&SessionEvent::Done)
    );
    build_sse_response(Body::from(payload))
}

fn build_sse_response(body: Body) -> Response {
    let mut resp = Response::new(body);
    let h = resp.headers_mut();
    h.insert("Content-Type", "text/event-stream".parse().unwrap());
    h.insert("Cache-Control", "no-cache".parse().unwrap());
    h.insert("Connection", "keep-alive".parse().unwrap());
    h.insert("X-Accel-Buffering", "no".parse().unwrap());
    resp
}
