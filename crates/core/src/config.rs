use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::TimeRangeError;
use crate::time_range::InspectionWindow;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub elasticsearch: ElasticsearchConfig,
    pub cache: CacheConfig,
    pub monitor: MonitorConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RAD_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RAD_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            elasticsearch: ElasticsearchConfig::from_env_profiled(p),
            cache: CacheConfig::from_env_profiled(p),
            monitor: MonitorConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  elasticsearch: url={}, index={}, auth={}",
            self.elasticsearch.base_url(),
            self.elasticsearch.index,
            self.elasticsearch.username.is_some()
        );
        tracing::info!(
            "  cache:         ttl={}ms, slow_query={}ms, window={}",
            self.cache.ttl_ms,
            self.cache.slow_query_ms,
            self.cache.metrics_window
        );
        tracing::info!(
            "  monitor:       baseline=[{}, {}), current={}, size={}",
            self.monitor.baseline_start,
            self.monitor.baseline_end,
            self.monitor.current_time_range,
            self.monitor.terms_size
        );
    }

    /// Return a redacted view safe for display (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "elasticsearch": {
                "url": self.elasticsearch.base_url(),
                "index": self.elasticsearch.index,
                "authenticated": self.elasticsearch.username.is_some(),
                "request_timeout_ms": self.elasticsearch.request_timeout_ms,
            },
            "cache": {
                "ttl_ms": self.cache.ttl_ms,
                "slow_query_ms": self.cache.slow_query_ms,
                "metrics_window": self.cache.metrics_window,
            },
            "monitor": {
                "entity_field": self.monitor.entity_field,
                "baseline_start": self.monitor.baseline_start,
                "baseline_end": self.monitor.baseline_end,
                "current_time_range": self.monitor.current_time_range,
                "terms_size": self.monitor.terms_size,
                "high_volume_threshold": self.monitor.high_volume_threshold,
                "medium_volume_threshold": self.monitor.medium_volume_threshold,
                "inspect_from": self.monitor.inspect_from,
                "inspect_to": self.monitor.inspect_to,
            },
        })
    }
}

// ── Elasticsearch ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    pub host: String,
    pub port: u16,
    /// Index pattern searched by every query.
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_ssl: bool,
    pub request_timeout_ms: u64,
}

impl ElasticsearchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "ES_HOST", "localhost"),
            port: profiled_env_parse(p, "ES_PORT", 9200),
            index: profiled_env_or(p, "ES_INDEX", "traffic-*"),
            username: profiled_env_opt(p, "ES_USERNAME"),
            password: profiled_env_opt(p, "ES_PASSWORD"),
            use_ssl: profiled_env_or(p, "ES_USE_SSL", "false") == "true",
            request_timeout_ms: profiled_env_parse(p, "ES_REQUEST_TIMEOUT_MS", 30_000),
        }
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

// ── Query cache ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries older than this are treated as misses.
    pub ttl_ms: u64,
    /// Executions slower than this are flagged as performance events.
    pub slow_query_ms: u64,
    /// Number of recent durations kept for latency reporting.
    pub metrics_window: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 5 * 60 * 1000,
            slow_query_ms: 5_000,
            metrics_window: 100,
        }
    }
}

impl CacheConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            ttl_ms: profiled_env_parse(p, "RAD_CACHE_TTL_MS", d.ttl_ms),
            slow_query_ms: profiled_env_parse(p, "RAD_SLOW_QUERY_MS", d.slow_query_ms),
            metrics_window: profiled_env_parse(p, "RAD_METRICS_WINDOW", d.metrics_window).max(1),
        }
    }
}

// ── Traffic monitor ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Keyword field holding the entity (event) ID.
    pub entity_field: String,
    pub baseline_start: String,
    pub baseline_end: String,
    /// Current-window expression, see [`crate::TimeRangeExpr`].
    pub current_time_range: String,
    /// Maximum number of entity buckets requested.
    pub terms_size: u32,
    pub high_volume_threshold: f64,
    pub medium_volume_threshold: f64,
    pub poll_interval_secs: u64,
    pub categories_file: PathBuf,
    /// Start of the `inspection_time` window.
    pub inspect_from: Option<String>,
    /// End of the `inspection_time` window.
    pub inspect_to: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            entity_field: "detail.event.data.traffic.eid.keyword".to_string(),
            baseline_start: "2025-06-01".to_string(),
            baseline_end: "2025-06-09".to_string(),
            current_time_range: "now-12h".to_string(),
            terms_size: 500,
            high_volume_threshold: 1000.0,
            medium_volume_threshold: 100.0,
            poll_interval_secs: 300,
            categories_file: PathBuf::from("config/categories.yml"),
            inspect_from: None,
            inspect_to: None,
        }
    }
}

impl MonitorConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            entity_field: profiled_env_or(p, "RAD_ENTITY_FIELD", &d.entity_field),
            baseline_start: profiled_env_or(p, "RAD_BASELINE_START", &d.baseline_start),
            baseline_end: profiled_env_or(p, "RAD_BASELINE_END", &d.baseline_end),
            current_time_range: profiled_env_or(p, "RAD_CURRENT_RANGE", &d.current_time_range),
            terms_size: profiled_env_parse(p, "RAD_TERMS_SIZE", d.terms_size),
            high_volume_threshold: profiled_env_parse(p, "RAD_HIGH_VOLUME", d.high_volume_threshold),
            medium_volume_threshold: profiled_env_parse(
                p,
                "RAD_MEDIUM_VOLUME",
                d.medium_volume_threshold,
            ),
            poll_interval_secs: profiled_env_parse(p, "RAD_POLL_INTERVAL_SECS", d.poll_interval_secs),
            categories_file: profiled_env_opt(p, "RAD_CATEGORIES_FILE")
                .map(PathBuf::from)
                .unwrap_or(d.categories_file),
            inspect_from: profiled_env_opt(p, "RAD_INSPECT_FROM"),
            inspect_to: profiled_env_opt(p, "RAD_INSPECT_TO"),
        }
    }

    /// Window used to resolve `inspection_time`, when configured.
    pub fn inspection_window(&self) -> Result<Option<InspectionWindow>, TimeRangeError> {
        match (&self.inspect_from, &self.inspect_to) {
            (Some(from), Some(to)) => InspectionWindow::parse(from, to).map(Some),
            (None, None) => Ok(None),
            _ => Err(TimeRangeError::IncompleteInspectionWindow),
        }
    }
}
