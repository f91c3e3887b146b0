//! Snipforge
//!
//! A streaming UI-component studio backend: users describe a component in
//! chat, the generation backend streams the answer over SSE, and responses
//! carrying the component sentinel are rendered and saved as reusable
//! snippets.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server with SSE streaming
//! - **Streaming core**: One [`stream::StreamSession`] per submitted query,
//!   classifying chat versus component output from the first frame
//! - **Sessions**: In-memory transcripts accumulated from stream deltas
//! - **Catalog**: Pluggable persistence for saved component snippets
//!
//! # Modules
//!
//! - [`backend`]: Streaming client for the chat-completion backend
//! - [`stream`]: Session event model, sinks and SSE formatting
//! - [`session`]: Conversation transcripts and session storage
//! - [`catalog`]: Saved component persistence providers
//! - [`snippet`]: Component extraction, parsing and validation

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod backend;
pub mod catalog;
pub mod config;
pub mod server;
pub mod session;
pub mod snippet;
pub mod stream;

use std::sync::Arc;

use crate::backend::BackendClient;
use crate::catalog::ComponentStore;
use crate::config::AppConfig;
use crate::session::SessionStore;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Streaming backend client.
    pub backend: BackendClient,
    /// Session store for conversation management.
    pub sessions: SessionStore,
    /// Saved component catalog.
    pub catalog: Arc<dyn ComponentStore>,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}
