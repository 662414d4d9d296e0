//! Query execution for the traffic anomaly monitor.
//!
//! This crate provides:
//! - The injected search transport trait and an Elasticsearch HTTP implementation
//! - A caching executor with TTL and per-key in-flight coalescing
//! - Rolling latency metrics and slow-query reporting
//! - Normalization of raw aggregation responses into typed buckets

pub mod cache;
pub mod elasticsearch;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod normalize;
pub mod transport;

pub use cache::cache_key;
pub use elasticsearch::ElasticsearchTransport;
pub use error::{ExecuteError, TransportError};
pub use executor::{ExecuteOptions, ExecutorSettings, ExecutorStats, QueryExecutor};
pub use metrics::{PerformanceReport, QueryMetrics};
pub use normalize::{
    normalize, normalize_aggregation, ErrorInfo, Hit, NormalizedAggregation, NormalizedBucket, NormalizedResponse,
};
pub use transport::SearchTransport;
