use rad_query::QueryDocument;

use crate::error::TransportError;

/// Abstraction over the search backend.
///
/// The executor only depends on this trait. [`crate::ElasticsearchTransport`]
/// implements it over HTTP; tests inject mocks.
#[async_trait::async_trait]
pub trait SearchTransport: Send + Sync {
    /// Run a compiled query and return the raw response body.
    async fn send(&self, document: &QueryDocument) -> Result<serde_json::Value, TransportError>;
}
