//! Error types for the lines bot.

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Chat transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send message on transport {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid response from {name}: {reason}")]
    InvalidResponse { name: String, reason: String },

    #[error("Storage error at {path}: {reason}")]
    Storage { path: String, reason: String },
}

/// Errors from the link-resolution service.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("Resolver request failed: {0}")]
    Request(String),

    #[error("Resolver returned {status}: {reason}")]
    Failed { status: u16, reason: String },

    #[error("Invalid resolver response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
