//! Link resolution: the external service that turns message text into
//! source line excerpts.

pub mod http;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ResolverError;

pub use http::HttpResolver;

/// One resolved excerpt: newline-joined source lines plus a file-type tag.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDatum {
    pub to_display: String,
    pub extension: String,
}

impl LineDatum {
    pub fn new(to_display: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            to_display: to_display.into(),
            extension: extension.into(),
        }
    }
}

/// Everything the resolver found in one message.
///
/// `total_lines` counts rendered source lines across all items, so it is
/// unrelated to `items.len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    #[serde(default)]
    pub items: Vec<LineDatum>,
    #[serde(default)]
    pub total_lines: u32,
}

impl ResolutionResult {
    /// Nothing recognized.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Resolves the links in a message body.
///
/// Implementations are expected to be deterministic for identical input.
#[async_trait]
pub trait LineResolver: Send + Sync {
    async fn resolve(&self, body: &str) -> Result<ResolutionResult, ResolverError>;
}
