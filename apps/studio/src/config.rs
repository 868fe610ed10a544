use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::models::options::Provider;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub generate_url: String,
    pub compile_url: String,
    pub port: u16,
    pub rust_log: String,
    pub compile_debounce: Duration,
    pub request_timeout: Duration,
    pub export_dir: Option<PathBuf>,
    pub default_provider: Provider,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        Ok(Config {
            generate_url: require("GENERATE_URL")?,
            compile_url: require("COMPILE_URL")?,
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            compile_debounce: Duration::from_millis(
                lookup("COMPILE_DEBOUNCE_MS")
                    .unwrap_or_else(|| "800".to_string())
                    .parse::<u64>()
                    .context("COMPILE_DEBOUNCE_MS must be a number of milliseconds")?,
            ),
            request_timeout: Duration::from_secs(
                lookup("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|| "120".to_string())
                    .parse::<u64>()
                    .context("REQUEST_TIMEOUT_SECS must be a number of seconds")?,
            ),
            export_dir: lookup("EXPORT_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            default_provider: lookup("DEFAULT_PROVIDER")
                .map(|v| v.parse::<Provider>())
                .transpose()
                .map_err(anyhow::Error::msg)
                .context("DEFAULT_PROVIDER must be one of openai, claude, gemini")?
                .unwrap_or_default(),
        })
    }
}
