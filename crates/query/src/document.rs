//! Query document model and Elasticsearch `_search` body rendering.
//!
//! Documents are built fresh per compilation and never mutated afterwards.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

/// Event timestamp field.
pub const TIMESTAMP_FIELD: &str = "@timestamp";

// ── Clauses ─────────────────────────────────────────────────────────

/// A boolean query clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    MatchAll,
    Term { field: String, value: Value },
    MatchPhrase { field: String, value: String },
    Wildcard { field: String, pattern: String },
    Range(RangeClause),
    Bool(BoolClause),
    /// Opaque free-text query, used when a filter expression is not understood.
    QueryString { query: String },
}

/// Range bounds on a single field; `gte` inclusive, `lt` exclusive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeClause {
    pub field: String,
    pub gte: Option<String>,
    pub lt: Option<String>,
    pub format: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoolClause {
    pub filter: Vec<Clause>,
    pub should: Vec<Clause>,
    pub must_not: Vec<Clause>,
    pub minimum_should_match: Option<u32>,
}

impl Clause {
    /// A boolean `should` over `clauses` requiring at least one match.
    pub fn any_of(clauses: Vec<Clause>) -> Clause {
        Clause::Bool(BoolClause {
            should: clauses,
            minimum_should_match: Some(1),
            ..Default::default()
        })
    }

    /// A boolean `filter` requiring every clause.
    pub fn all_of(clauses: Vec<Clause>) -> Clause {
        Clause::Bool(BoolClause {
            filter: clauses,
            ..Default::default()
        })
    }

    pub fn range(field: impl Into<String>, gte: Option<String>, lt: Option<String>) -> Clause {
        Clause::Range(RangeClause {
            field: field.into(),
            gte,
            lt,
            ..Default::default()
        })
    }

    pub fn to_json(&self) -> Value {
        match self {
            Clause::MatchAll => json!({ "match_all": {} }),
            Clause::Term { field, value } => json!({ "term": { field: value } }),
            Clause::MatchPhrase { field, value } => json!({ "match_phrase": { field: value } }),
            Clause::Wildcard { field, pattern } => json!({ "wildcard": { field: { "value": pattern } } }),
            Clause::Range(r) => {
                let mut bounds = Map::new();
                if let Some(gte) = &r.gte {
                    bounds.insert("gte".into(), json!(gte));
                }
                if let Some(lt) = &r.lt {
                    bounds.insert("lt".into(), json!(lt));
                }
                if let Some(format) = &r.format {
                    bounds.insert("format".into(), json!(format));
                }
                if let Some(tz) = &r.time_zone {
                    bounds.insert("time_zone".into(), json!(tz));
                }
                json!({ "range": { r.field.as_str(): bounds } })
            }
            Clause::Bool(b) => {
                let mut body = Map::new();
                let render = |clauses: &[Clause]| -> Value {
                    Value::Array(clauses.iter().map(Clause::to_json).collect())
                };
                if !b.filter.is_empty() {
                    body.insert("filter".into(), render(&b.filter));
                }
                if !b.should.is_empty() {
                    body.insert("should".into(), render(&b.should));
                }
                if !b.must_not.is_empty() {
                    body.insert("must_not".into(), render(&b.must_not));
                }
                if let Some(n) = b.minimum_should_match {
                    body.insert("minimum_should_match".into(), json!(n));
                }
                json!({ "bool": body })
            }
            Clause::QueryString { query } => {
                json!({ "query_string": { "query": query, "analyze_wildcard": true } })
            }
        }
    }
}

// ── Aggregations ────────────────────────────────────────────────────

/// Engine-native metric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Count,
    Avg,
    Sum,
    Max,
    Min,
    Percentile,
    Cardinality,
    LastValue,
}

impl MetricKind {
    /// Whether the metric needs a field argument.
    pub fn requires_field(self) -> bool {
        !matches!(self, MetricKind::Count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermsOrder {
    KeyAsc,
    KeyDesc,
    CountDesc,
}

impl TermsOrder {
    fn to_json(self) -> Value {
        match self {
            TermsOrder::KeyAsc => json!({ "_key": "asc" }),
            TermsOrder::KeyDesc => json!({ "_key": "desc" }),
            TermsOrder::CountDesc => json!({ "_count": "desc" }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermsAgg {
    pub field: String,
    pub size: u32,
    pub order: TermsOrder,
    pub sub_aggs: BTreeMap<String, AggregationNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateHistogramAgg {
    pub field: String,
    pub fixed_interval: String,
    pub sub_aggs: BTreeMap<String, AggregationNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterAgg {
    pub clause: Clause,
    pub sub_aggs: BTreeMap<String, AggregationNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricAgg {
    pub kind: MetricKind,
    pub field: Option<String>,
    pub percentile: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationNode {
    Terms(TermsAgg),
    DateHistogram(DateHistogramAgg),
    Filter(FilterAgg),
    Metric(MetricAgg),
}

fn with_sub_aggs(mut body: Map<String, Value>, sub_aggs: &BTreeMap<String, AggregationNode>) -> Value {
    if !sub_aggs.is_empty() {
        let aggs: Map<String, Value> = sub_aggs
            .iter()
            .map(|(name, node)| (name.clone(), node.to_json()))
            .collect();
        body.insert("aggs".into(), Value::Object(aggs));
    }
    Value::Object(body)
}

impl AggregationNode {
    pub fn sub_aggs(&self) -> Option<&BTreeMap<String, AggregationNode>> {
        match self {
            AggregationNode::Terms(t) => Some(&t.sub_aggs),
            AggregationNode::DateHistogram(h) => Some(&h.sub_aggs),
            AggregationNode::Filter(f) => Some(&f.sub_aggs),
            AggregationNode::Metric(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AggregationNode::Terms(t) => {
                let mut body = Map::new();
                body.insert(
                    "terms".into(),
                    json!({ "field": t.field, "size": t.size, "order": t.order.to_json() }),
                );
                with_sub_aggs(body, &t.sub_aggs)
            }
            AggregationNode::DateHistogram(h) => {
                let mut body = Map::new();
                body.insert(
                    "date_histogram".into(),
                    json!({ "field": h.field, "fixed_interval": h.fixed_interval, "min_doc_count": 0 }),
                );
                with_sub_aggs(body, &h.sub_aggs)
            }
            AggregationNode::Filter(f) => {
                let mut body = Map::new();
                body.insert("filter".into(), f.clause.to_json());
                with_sub_aggs(body, &f.sub_aggs)
            }
            AggregationNode::Metric(m) => m.to_json(),
        }
    }
}

impl MetricAgg {
    fn to_json(&self) -> Value {
        let field = self.field.as_deref().unwrap_or_default();
        match self.kind {
            // A field-less count is the document count of a match-all filter.
            MetricKind::Count if self.field.is_none() => json!({ "filter": { "match_all": {} } }),
            MetricKind::Count => json!({ "value_count": { "field": field } }),
            MetricKind::Avg => json!({ "avg": { "field": field } }),
            MetricKind::Sum => json!({ "sum": { "field": field } }),
            MetricKind::Max => json!({ "max": { "field": field } }),
            MetricKind::Min => json!({ "min": { "field": field } }),
            MetricKind::Cardinality => json!({ "cardinality": { "field": field } }),
            MetricKind::Percentile => json!({
                "percentiles": { "field": field, "percents": [self.percentile.unwrap_or(50.0)] }
            }),
            MetricKind::LastValue => json!({
                "top_metrics": {
                    "metrics": { "field": field },
                    "sort": { TIMESTAMP_FIELD: "desc" },
                    "size": 1
                }
            }),
        }
    }
}

// ── Document ────────────────────────────────────────────────────────

/// Overall time bounds on the timestamp field, `[gte, lt)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBounds {
    pub gte: String,
    pub lt: String,
}

/// A compiled search: top-level filters plus one named root aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDocument {
    /// Target index pattern.
    pub index: String,
    pub filters: Vec<Clause>,
    pub root_name: String,
    pub root: AggregationNode,
    pub time_range: Option<TimeBounds>,
}

impl QueryDocument {
    /// Render the `_search` request body.
    pub fn to_search_body(&self) -> Value {
        let mut filters: Vec<Value> = self.filters.iter().map(Clause::to_json).collect();
        if let Some(t) = &self.time_range {
            filters.push(
                Clause::range(TIMESTAMP_FIELD, Some(t.gte.clone()), Some(t.lt.clone())).to_json(),
            );
        }
        let mut aggs = Map::new();
        aggs.insert(self.root_name.clone(), self.root.to_json());
        json!({
            "size": 0,
            "query": { "bool": { "filter": filters } },
            "aggs": aggs,
        })
    }
}
