//! HTTP client for the link-resolution service.

use async_trait::async_trait;

use crate::error::ResolverError;
use crate::resolver::{LineResolver, ResolutionResult};

/// Posts message bodies to the resolution service and decodes its answer.
pub struct HttpResolver {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpResolver {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LineResolver for HttpResolver {
    async fn resolve(&self, body: &str) -> Result<ResolutionResult, ResolverError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "message": body }))
            .send()
            .await
            .map_err(|e| ResolverError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let reason = resp.text().await.unwrap_or_default();
            return Err(ResolverError::Failed {
                status: status.as_u16(),
                reason,
            });
        }

        let result: ResolutionResult = resp
            .json()
            .await
            .map_err(|e| ResolverError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            items = result.items.len(),
            total_lines = result.total_lines,
            "Resolver answered"
        );
        Ok(result)
    }
}
