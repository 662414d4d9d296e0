//! Caching query executor.
//!
//! - Live cache entries (age < TTL) are returned without a transport call.
//! - At most one transport call per key is in flight. Concurrent callers
//!   for the same key join it and observe the same outcome.
//! - Successes are cached; failures and timeouts never are.
//! - Every execution is timed into a rolling metrics window. Executions
//!   slower than the slow-query threshold are reported as performance
//!   events, not errors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use rad_core::config::{CacheConfig, ElasticsearchConfig};
use rad_query::QueryDocument;
use serde::Serialize;
use tokio::time::{Duration, Instant};

use crate::cache::{cache_key, CacheEntry};
use crate::error::ExecuteError;
use crate::metrics::{PerformanceReport, QueryMetrics};
use crate::transport::SearchTransport;

type ExecuteResult = Result<Arc<serde_json::Value>, ExecuteError>;
type SharedExecution = Shared<BoxFuture<'static, ExecuteResult>>;

/// Static executor settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorSettings {
    pub ttl: Duration,
    pub slow_query: Duration,
    pub metrics_window: usize,
    /// Transport calls still pending after this are aborted.
    pub timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default(), 30_000)
    }
}

impl ExecutorSettings {
    pub fn from_config(cache: &CacheConfig, timeout_ms: u64) -> Self {
        Self {
            ttl: Duration::from_millis(cache.ttl_ms),
            slow_query: Duration::from_millis(cache.slow_query_ms),
            metrics_window: cache.metrics_window,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn from_configs(cache: &CacheConfig, es: &ElasticsearchConfig) -> Self {
        Self::from_config(cache, es.request_timeout_ms)
    }
}

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExecuteOptions {
    /// Skip the cached entry. Still joins an in-flight call for the key.
    pub force_refresh: bool,
    /// Overrides the executor TTL for this lookup.
    pub ttl: Option<Duration>,
}

impl ExecuteOptions {
    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
            ttl: None,
        }
    }
}

/// Snapshot of cache occupancy and lookup counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorStats {
    pub entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    /// Hits over hits plus misses, 0 before the first lookup.
    pub hit_rate: f64,
}

struct InFlight {
    /// Distinguishes this execution from later ones for the same key.
    id: u64,
    future: SharedExecution,
}

struct ExecutorState {
    settings: ExecutorSettings,
    cache: Mutex<HashMap<String, CacheEntry>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    metrics: Mutex<QueryMetrics>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ExecutorState {
    /// Record the outcome and release the in-flight slot.
    ///
    /// The response is stored before the slot is released, so a caller
    /// arriving in between sees either the slot or the entry. Nothing is
    /// stored if the slot was invalidated while the call ran.
    fn complete(&self, key: &str, id: u64, query_id: &str, outcome: &ExecuteResult, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        let slow = lock(&self.metrics).record(elapsed, outcome.is_ok());

        match outcome {
            Ok(_) if slow => tracing::warn!(
                event = "performance",
                query_id,
                duration_ms = elapsed_ms,
                threshold_ms = self.settings.slow_query.as_millis() as u64,
                "slow query"
            ),
            Ok(_) => tracing::debug!(query_id, duration_ms = elapsed_ms, "query executed"),
            Err(e) => tracing::error!(query_id, duration_ms = elapsed_ms, error = %e, "query failed"),
        }

        let mut cache = lock(&self.cache);
        let mut in_flight = lock(&self.in_flight);
        if in_flight.get(key).map(|f| f.id) != Some(id) {
            tracing::debug!(query_id, "in-flight slot invalidated, result not cached");
            return;
        }
        if let Ok(response) = outcome {
            cache.insert(key.to_string(), CacheEntry::new(Arc::clone(response)));
        }
        in_flight.remove(key);
    }
}

/// Caching, coalescing front for a [`SearchTransport`].
///
/// Cheap to clone; clones share the cache, in-flight registry and metrics.
#[derive(Clone)]
pub struct QueryExecutor {
    transport: Arc<dyn SearchTransport>,
    state: Arc<ExecutorState>,
}

impl QueryExecutor {
    pub fn new(transport: Arc<dyn SearchTransport>, settings: ExecutorSettings) -> Self {
        let metrics = QueryMetrics::new(settings.metrics_window, settings.slow_query);
        Self {
            transport,
            state: Arc::new(ExecutorState {
                settings,
                cache: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                metrics: Mutex::new(metrics),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.state.settings
    }

    /// Execute `document` under the logical `query_id`.
    pub async fn execute(
        &self,
        query_id: &str,
        document: &QueryDocument,
        options: ExecuteOptions,
    ) -> ExecuteResult {
        let key = cache_key(query_id, document);
        let ttl = options.ttl.unwrap_or(self.state.settings.ttl);

        let execution = {
            let mut cache = lock(&self.state.cache);
            if options.force_refresh {
                cache.remove(&key);
            } else if let Some(entry) = cache.get(&key) {
                if entry.is_live(ttl) {
                    lock(&self.state.metrics).hits += 1;
                    tracing::debug!(query_id, key = %key, "cache hit");
                    return Ok(Arc::clone(&entry.response));
                }
                cache.remove(&key);
            }

            let mut in_flight = lock(&self.state.in_flight);
            if let Some(pending) = in_flight.get(&key) {
                lock(&self.state.metrics).coalesced += 1;
                tracing::debug!(query_id, key = %key, "joining in-flight query");
                pending.future.clone()
            } else {
                lock(&self.state.metrics).misses += 1;
                tracing::debug!(query_id, key = %key, "cache miss");
                let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
                let future = self.start_execution(key.clone(), id, query_id, document);
                in_flight.insert(key, InFlight { id, future: future.clone() });
                future
            }
        };

        execution.await
    }

    fn start_execution(
        &self,
        key: String,
        id: u64,
        query_id: &str,
        document: &QueryDocument,
    ) -> SharedExecution {
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let document = document.clone();
        let query_id = query_id.to_string();
        let timeout = state.settings.timeout;

        async move {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(timeout, transport.send(&document)).await {
                Ok(Ok(response)) => Ok(Arc::new(response)),
                Ok(Err(source)) => Err(ExecuteError::Transport {
                    source,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }),
                Err(_) => Err(ExecuteError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }),
            };
            state.complete(&key, id, &query_id, &outcome, started.elapsed());
            outcome
        }
        .boxed()
        .shared()
    }

    /// Drop one key from the cache and the in-flight registry. Callers
    /// already waiting on a dropped execution still receive its outcome.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = lock(&self.state.cache).remove(key).is_some();
        let aborted = lock(&self.state.in_flight).remove(key).is_some();
        removed || aborted
    }

    /// Remove entries older than the TTL. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let ttl = self.state.settings.ttl;
        let mut cache = lock(&self.state.cache);
        let before = cache.len();
        cache.retain(|_, entry| entry.is_live(ttl));
        let evicted = before - cache.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = cache.len(), "evicted expired cache entries");
        }
        evicted
    }

    /// Drop every cached entry, in-flight slot and metric.
    pub fn clear(&self) {
        lock(&self.state.cache).clear();
        lock(&self.state.in_flight).clear();
        lock(&self.state.metrics).reset();
        tracing::info!("query cache cleared");
    }

    pub fn stats(&self) -> ExecutorStats {
        let entries = lock(&self.state.cache).len();
        let in_flight = lock(&self.state.in_flight).len();
        let metrics = lock(&self.state.metrics);
        ExecutorStats {
            entries,
            in_flight,
            hits: metrics.hits,
            misses: metrics.misses,
            coalesced: metrics.coalesced,
            hit_rate: metrics.hit_rate(),
        }
    }

    pub fn performance_report(&self) -> PerformanceReport {
        lock(&self.state.metrics).report()
    }
}
