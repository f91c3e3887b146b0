use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::backend::BackendSettings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Catalog provider ("memory" or "json")
    #[arg(long, env = "CATALOG_PROVIDER")]
    pub catalog_provider: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// "memory" or "json".
    pub provider: String,
    /// Path of the JSON catalog document, used by the "json" provider.
    pub path: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    /// Layered load: defaults, then optional config file, then STUDIO_*
    /// environment variables, then CLI flags.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("catalog.provider", "memory")?
            .set_default("catalog.path", "data/catalog.json")?;

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        }

        // E.g. STUDIO_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("STUDIO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(provider) = cli.catalog_provider {
            builder = builder.set_override("catalog.provider", provider)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}

/// Load the streaming backend credentials from the environment.
pub fn load_backend_settings() -> Result<BackendSettings, String> {
    let base_url = std::env::var("BACKEND_BASE_URL")
        .map_err(|_| "Missing required env var: BACKEND_BASE_URL".to_string())?;
    if base_url.trim().is_empty() {
        return Err("BACKEND_BASE_URL cannot be empty".to_string());
    }

    let api_key = std::env::var("BACKEND_API_KEY")
        .map_err(|_| "Missing required env var: BACKEND_API_KEY".to_string())?;
    if api_key.trim().is_empty() {
        return Err("BACKEND_API_KEY cannot be empty".to_string());
    }

    let user = std::env::var("BACKEND_USER")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "demo-user".to_string());

    Ok(BackendSettings {
        base_url,
        api_key,
        user,
    })
}
