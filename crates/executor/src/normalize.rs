//! Response normalization.
//!
//! Raw aggregation objects are classified in this order:
//!
//! 1. `buckets` array whose first bucket has a date-string key → date histogram
//! 2. `buckets` array → terms
//! 3. numeric `doc_count` → filter
//! 4. anything else → generic, passed through untouched
//!
//! Sub-aggregations are every object-valued field of a bucket (or filter)
//! other than the reserved `key`, `doc_count` and `key_as_string`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

const RESERVED_KEYS: &[&str] = &["key", "doc_count", "key_as_string"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizedAggregation {
    Terms {
        buckets: Vec<NormalizedBucket>,
    },
    DateHistogram {
        buckets: Vec<NormalizedBucket>,
    },
    Filter {
        doc_count: u64,
        sub_aggregations: BTreeMap<String, NormalizedAggregation>,
    },
    Generic {
        value: Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedBucket {
    pub key: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub doc_count: u64,
    pub sub_aggregations: BTreeMap<String, NormalizedAggregation>,
}

impl NormalizedBucket {
    /// The bucket key as a string. Numbers are rendered as-is.
    pub fn key_string(&self) -> String {
        match &self.key {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn sub(&self, name: &str) -> Option<&NormalizedAggregation> {
        self.sub_aggregations.get(name)
    }

    /// Document count of a named filter sub-aggregation.
    pub fn doc_count_of(&self, name: &str) -> Option<u64> {
        self.sub(name).and_then(NormalizedAggregation::doc_count)
    }
}

impl NormalizedAggregation {
    pub fn buckets(&self) -> &[NormalizedBucket] {
        match self {
            NormalizedAggregation::Terms { buckets }
            | NormalizedAggregation::DateHistogram { buckets } => buckets,
            _ => &[],
        }
    }

    pub fn doc_count(&self) -> Option<u64> {
        match self {
            NormalizedAggregation::Filter { doc_count, .. } => Some(*doc_count),
            _ => None,
        }
    }

    /// Single numeric value of a generic metric aggregation.
    ///
    /// Understands `value`, the first entry of `values` (percentiles) and
    /// the first metric of `top` (top metrics).
    pub fn value(&self) -> Option<f64> {
        let NormalizedAggregation::Generic { value } = self else {
            return None;
        };
        if let Some(v) = value.get("value").and_then(Value::as_f64) {
            return Some(v);
        }
        if let Some(values) = value.get("values").and_then(Value::as_object) {
            return values.values().find_map(Value::as_f64);
        }
        value
            .get("top")
            .and_then(|top| top.get(0))
            .and_then(|first| first.get("metrics"))
            .and_then(Value::as_object)
            .and_then(|metrics| metrics.values().find_map(Value::as_f64))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NormalizedAggregation::Terms { .. } => "terms",
            NormalizedAggregation::DateHistogram { .. } => "date_histogram",
            NormalizedAggregation::Filter { .. } => "filter",
            NormalizedAggregation::Generic { .. } => "generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub id: Option<String>,
    pub index: Option<String>,
    pub score: Option<f64>,
    pub source: Value,
}

/// Failure details reported inside an otherwise parseable response.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ErrorInfo {
    pub error_type: Option<String>,
    pub reason: Option<String>,
    pub status: Option<u16>,
    pub timed_out: bool,
    pub shard_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NormalizedResponse {
    pub aggregations: BTreeMap<String, NormalizedAggregation>,
    pub hits: Vec<Hit>,
    pub total_hits: Option<u64>,
    pub took_ms: Option<u64>,
    pub error: Option<ErrorInfo>,
}

impl NormalizedResponse {
    pub fn aggregation(&self, name: &str) -> Option<&NormalizedAggregation> {
        self.aggregations.get(name)
    }
}

// ── Classification ──────────────────────────────────────────────────

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Date carried by a bucket, from `key_as_string` or a string key.
fn bucket_date(bucket: &Value) -> Option<DateTime<Utc>> {
    bucket
        .get("key_as_string")
        .and_then(Value::as_str)
        .and_then(parse_date)
        .or_else(|| bucket.get("key").and_then(Value::as_str).and_then(parse_date))
}

fn epoch_millis(key: &Value) -> Option<DateTime<Utc>> {
    key.as_i64()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

fn sub_aggregations(object: &Map<String, Value>) -> BTreeMap<String, NormalizedAggregation> {
    object
        .iter()
        .filter(|(name, value)| !RESERVED_KEYS.contains(&name.as_str()) && value.is_object())
        .map(|(name, value)| (name.clone(), normalize_aggregation(value)))
        .collect()
}

fn normalize_bucket(raw: &Value, dated: bool) -> NormalizedBucket {
    let key = raw.get("key").cloned().unwrap_or(Value::Null);
    let timestamp = if dated {
        bucket_date(raw).or_else(|| epoch_millis(&key))
    } else {
        None
    };
    NormalizedBucket {
        timestamp,
        doc_count: raw.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
        sub_aggregations: raw.as_object().map(sub_aggregations).unwrap_or_default(),
        key,
    }
}

/// Normalize one raw aggregation object.
pub fn normalize_aggregation(raw: &Value) -> NormalizedAggregation {
    if let Some(buckets) = raw.get("buckets").and_then(Value::as_array) {
        let dated = buckets.first().and_then(bucket_date).is_some();
        let buckets = buckets.iter().map(|b| normalize_bucket(b, dated)).collect();
        return if dated {
            NormalizedAggregation::DateHistogram { buckets }
        } else {
            NormalizedAggregation::Terms { buckets }
        };
    }

    if let (Some(doc_count), Some(object)) = (
        raw.get("doc_count").and_then(Value::as_u64),
        raw.as_object(),
    ) {
        return NormalizedAggregation::Filter {
            doc_count,
            sub_aggregations: sub_aggregations(object),
        };
    }

    NormalizedAggregation::Generic { value: raw.clone() }
}

fn error_info(raw: &Value) -> Option<ErrorInfo> {
    let mut info = ErrorInfo {
        status: raw
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok()),
        timed_out: raw.get("timed_out").and_then(Value::as_bool).unwrap_or(false),
        shard_failures: raw
            .pointer("/_shards/failed")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        ..Default::default()
    };

    match raw.get("error") {
        Some(Value::Object(e)) => {
            info.error_type = e.get("type").and_then(Value::as_str).map(str::to_string);
            info.reason = e.get("reason").and_then(Value::as_str).map(str::to_string);
        }
        Some(Value::String(reason)) => info.reason = Some(reason.clone()),
        _ => {}
    }

    let failed = info.reason.is_some() || info.timed_out || info.shard_failures > 0;
    failed.then_some(info)
}

fn hits(raw: &Value) -> Vec<Hit> {
    raw.pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .map(|h| Hit {
                    id: h.get("_id").and_then(Value::as_str).map(str::to_string),
                    index: h.get("_index").and_then(Value::as_str).map(str::to_string),
                    score: h.get("_score").and_then(Value::as_f64),
                    source: h.get("_source").cloned().unwrap_or(Value::Null),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn total_hits(raw: &Value) -> Option<u64> {
    let total = raw.pointer("/hits/total")?;
    total
        .as_u64()
        .or_else(|| total.get("value").and_then(Value::as_u64))
}

/// Normalize a raw `_search` response.
pub fn normalize(raw: &Value) -> NormalizedResponse {
    let aggregations = raw
        .get("aggregations")
        .and_then(Value::as_object)
        .map(|aggs| {
            aggs.iter()
                .map(|(name, value)| (name.clone(), normalize_aggregation(value)))
                .collect()
        })
        .unwrap_or_default();

    let error = error_info(raw);
    if let Some(e) = &error {
        tracing::warn!(
            error_type = ?e.error_type,
            reason = ?e.reason,
            timed_out = e.timed_out,
            shard_failures = e.shard_failures,
            "search response reported a failure"
        );
    }

    NormalizedResponse {
        aggregations,
        hits: hits(raw),
        total_hits: total_hits(raw),
        took_ms: raw.get("took").and_then(Value::as_u64),
        error,
    }
}
