//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default location of the transport's join-state file.
pub const DEFAULT_STORAGE_PATH: &str = "lines-bot-matrix.json";

/// Default endpoint of the link-resolution service.
pub const DEFAULT_RESOLVER_URL: &str = "http://127.0.0.1:8000/resolve";

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Matrix access token.
    pub matrix_token: SecretString,
    /// Homeserver base URL, without a trailing slash.
    pub homeserver: String,
    /// Where the transport persists its sync token and joined rooms.
    pub storage_path: PathBuf,
    /// Endpoint the message body is POSTed to for resolution.
    pub resolver_url: String,
    /// Join rooms automatically when invited.
    pub auto_join: bool,
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let matrix_token = lookup("MATRIX_TOKEN")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("MATRIX_TOKEN".into()))?;

        let homeserver = lookup("MATRIX_HOMESERVER")
            .ok_or_else(|| ConfigError::MissingEnvVar("MATRIX_HOMESERVER".into()))?;
        let homeserver = homeserver.trim().trim_end_matches('/').to_string();
        if homeserver.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "MATRIX_HOMESERVER".into(),
                message: "must not be empty".into(),
            });
        }

        let storage_path = lookup("LINES_BOT_STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH));

        let resolver_url =
            lookup("LINES_BOT_RESOLVER_URL").unwrap_or_else(|| DEFAULT_RESOLVER_URL.to_string());

        let auto_join = match lookup("LINES_BOT_AUTO_JOIN") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                key: "LINES_BOT_AUTO_JOIN".into(),
                message: format!("expected a boolean, got {raw:?}"),
            })?,
            None => true,
        };

        Ok(Self {
            matrix_token: SecretString::from(matrix_token),
            homeserver,
            storage_path,
            resolver_url,
            auto_join,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
