//! Snipforge server
//!
//! Entry point for the streaming component-studio backend.

use std::sync::Arc;

use dotenvy::dotenv;
use mimalloc::MiMalloc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use snipforge::backend::BackendClient;
use snipforge::catalog::{ComponentStore, JsonFileStore, MemoryStore};
use snipforge::config::{self, AppConfig};
use snipforge::session::SessionStore;
use snipforge::{AppState, server};

/// Global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // Load .env (if present)
    let _ = dotenv();

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let settings = match config::load_backend_settings() {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Configuration error: {msg}");
            std::process::exit(1);
        }
    };

    info!(
        name: "backend.config.loaded",
        base_url = %settings.base_url,
        user = %settings.user,
        "Backend configuration loaded"
    );

    let catalog: Arc<dyn ComponentStore> = match config.catalog.provider.as_str() {
        "json" => {
            info!(name: "catalog.provider", path = %config.catalog.path, "Using JSON file catalog");
            Arc::new(JsonFileStore::new(&config.catalog.path))
        }
        "memory" => Arc::new(MemoryStore::new()),
        other => {
            eprintln!("Configuration error: unknown catalog provider: {other}");
            std::process::exit(1);
        }
    };

    let state = AppState {
        backend: BackendClient::new(settings),
        sessions: SessionStore::new(),
        catalog,
        config: Arc::new(config),
    };

    if let Err(e) = server::start_server(state).await {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
