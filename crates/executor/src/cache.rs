//! Content-addressed cache keys and entries.

use std::sync::Arc;

use rad_query::QueryDocument;
use sha2::{Digest, Sha256};
use tokio::time::{Duration, Instant};

/// SHA-256 hex of the logical query id, the target index and the rendered
/// search body.
///
/// `serde_json` maps are sorted, so equal documents render identically.
pub fn cache_key(query_id: &str, document: &QueryDocument) -> String {
    let mut hasher = Sha256::new();
    for part in [query_id, document.index.as_str()] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(document.to_search_body().to_string().as_bytes());
    let digest = hasher.finalize();
    format!("{digest:x}")
}

/// A stored response and when it was stored.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub response: Arc<serde_json::Value>,
    pub stored_at: Instant,
}

impl CacheEntry {
    pub fn new(response: Arc<serde_json::Value>) -> Self {
        Self {
            response,
            stored_at: Instant::now(),
        }
    }

    /// Live while younger than `ttl`.
    pub fn is_live(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}
