//! Elasticsearch `_search` transport over HTTP.

use std::time::Duration;

use rad_core::config::ElasticsearchConfig;
use rad_query::QueryDocument;

use crate::error::TransportError;
use crate::transport::SearchTransport;

/// Sends compiled documents to `{base_url}/{index}/_search`.
#[derive(Debug, Clone)]
pub struct ElasticsearchTransport {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl ElasticsearchTransport {
    pub fn new(config: &ElasticsearchConfig) -> Self {
        Self {
            base_url: config.base_url(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: Duration::from_millis(config.request_timeout_ms),
            client: reqwest::Client::new(),
        }
    }

    pub fn search_url(&self, index: &str) -> String {
        format!("{}/{}/_search", self.base_url.trim_end_matches('/'), index)
    }
}

/// Pull `error.reason` (or a string `error`) out of an error body.
fn error_reason(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match &value["error"] {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(e) => e
            .get("reason")
            .and_then(|r| r.as_str())
            .map(str::to_string),
        _ => None,
    }
}

#[async_trait::async_trait]
impl SearchTransport for ElasticsearchTransport {
    async fn send(&self, document: &QueryDocument) -> Result<serde_json::Value, TransportError> {
        let url = self.search_url(&document.index);
        let mut request = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&document.to_search_body());

        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(%url, %status, body = %body_text, "search returned non-2xx status");
            let message = error_reason(&body_text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("search failed").to_string());
            return Err(TransportError::new(Some(status.as_u16()), message));
        }

        Ok(response.json().await?)
    }
}
