//! Restricted KQL translator for `kql:` named arguments.
//!
//! Exactly three shapes are understood, tried in order:
//!
//! 1. `@timestamp >= "X" and @timestamp < "Y"` (either order)
//! 2. `@timestamp >= "X"`
//! 3. `field: "value"` or `field: value`
//!
//! Anything else becomes an opaque `query_string` clause. That fallback
//! is best effort: the engine interprets it, not this module.

use std::sync::OnceLock;

use regex::Regex;

use crate::document::{Clause, RangeClause, TIMESTAMP_FIELD};

/// Timezone attached to every timestamp bound produced here.
pub const KQL_TIME_ZONE: &str = "UTC";

const VALUE: &str = r#""?([^"\s=][^"\s]*)"?"#;

struct Patterns {
    lower_then_upper: Regex,
    upper_then_lower: Regex,
    lower_only: Regex,
    field_match: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let lower = format!(r"@timestamp\s*>=\s*{}", VALUE);
        let upper = format!(r"@timestamp\s*<\s*{}", VALUE);
        let build = |p: String| Regex::new(&p).expect("static KQL pattern");
        Patterns {
            lower_then_upper: build(format!(r"(?i)^\s*{}\s+and\s+{}\s*$", lower, upper)),
            upper_then_lower: build(format!(r"(?i)^\s*{}\s+and\s+{}\s*$", upper, lower)),
            lower_only: build(format!(r"^\s*{}\s*$", lower)),
            field_match: build(r#"^\s*([A-Za-z_@][A-Za-z0-9_.@\-]*)\s*:\s*(?:"([^"]*)"|([^\s"()]+))\s*$"#.to_string()),
        }
    })
}

fn timestamp_bound(gte: Option<&str>, lt: Option<&str>) -> Clause {
    Clause::any_of(vec![Clause::Range(RangeClause {
        field: TIMESTAMP_FIELD.to_string(),
        gte: gte.map(str::to_string),
        lt: lt.map(str::to_string),
        format: None,
        time_zone: Some(KQL_TIME_ZONE.to_string()),
    })])
}

/// Translate a filter expression into a clause.
pub fn parse_filter_expression(expr: &str) -> Clause {
    let p = patterns();

    if let Some(caps) = p.lower_then_upper.captures(expr) {
        return Clause::all_of(vec![
            timestamp_bound(Some(&caps[1]), None),
            timestamp_bound(None, Some(&caps[2])),
        ]);
    }
    if let Some(caps) = p.upper_then_lower.captures(expr) {
        return Clause::all_of(vec![
            timestamp_bound(Some(&caps[2]), None),
            timestamp_bound(None, Some(&caps[1])),
        ]);
    }
    if let Some(caps) = p.lower_only.captures(expr) {
        return timestamp_bound(Some(&caps[1]), None);
    }
    if let Some(caps) = p.field_match.captures(expr) {
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        return Clause::MatchPhrase {
            field: caps[1].to_string(),
            value,
        };
    }

    tracing::debug!(expr, "filter expression not understood, passing through as query_string");
    Clause::QueryString {
        query: expr.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wrapper(bound: &str, value: &str) -> serde_json::Value {
        json!({
            "bool": {
                "should": [{ "range": { "@timestamp": { bound: value, "time_zone": "UTC" } } }],
                "minimum_should_match": 1
            }
        })
    }

    #[test]
    fn timestamp_range_both_bounds() {
        let clause = parse_filter_expression(
            r#"@timestamp >= "2025-06-01T00:00:00Z" and @timestamp < "2025-06-02T00:00:00Z""#,
        );
        assert_eq!(
            clause.to_json(),
            json!({ "bool": { "filter": [
                wrapper("gte", "2025-06-01T00:00:00Z"),
                wrapper("lt", "2025-06-02T00:00:00Z"),
            ] } })
        );
    }

    #[test]
    fn timestamp_range_reversed_order() {
        let clause = parse_filter_expression(r#"@timestamp < "B" AND @timestamp >= "A""#);
        assert_eq!(
            clause.to_json(),
            json!({ "bool": { "filter": [wrapper("gte", "A"), wrapper("lt", "B")] } })
        );
    }

    #[test]
    fn timestamp_lower_bound_only() {
        let clause = parse_filter_expression(r#"@timestamp >= "now-1d""#);
        assert_eq!(clause.to_json(), wrapper("gte", "now-1d"));
    }

    #[test]
    fn quoted_field_value() {
        let clause = parse_filter_expression(r#"response.status: "500""#);
        assert_eq!(
            clause,
            Clause::MatchPhrase {
                field: "response.status".into(),
                value: "500".into()
            }
        );
    }

    #[test]
    fn bare_field_value() {
        let clause = parse_filter_expression("host: api-01");
        assert_eq!(
            clause,
            Clause::MatchPhrase {
                field: "host".into(),
                value: "api-01".into()
            }
        );
    }

    #[test]
    fn quoted_value_with_spaces() {
        let clause = parse_filter_expression(r#"message: "upstream timed out""#);
        assert_eq!(
            clause,
            Clause::MatchPhrase {
                field: "message".into(),
                value: "upstream timed out".into()
            }
        );
    }

    // Best-effort inputs: anything outside the three shapes passes through verbatim.

    #[test]
    fn boolean_combination_falls_back() {
        let expr = "status: 500 or status: 503";
        assert_eq!(
            parse_filter_expression(expr),
            Clause::QueryString { query: expr.into() }
        );
    }

    #[test]
    fn upper_bound_only_falls_back() {
        let expr = r#"@timestamp < "2025-06-02""#;
        assert_eq!(
            parse_filter_expression(expr),
            Clause::QueryString { query: expr.into() }
        );
    }

    #[test]
    fn free_text_falls_back() {
        let expr = "timeout";
        assert_eq!(
            parse_filter_expression(expr),
            Clause::QueryString { query: expr.into() }
        );
    }

    #[test]
    fn empty_expression_falls_back() {
        assert_eq!(
            parse_filter_expression(""),
            Clause::QueryString { query: String::new() }
        );
    }
}
