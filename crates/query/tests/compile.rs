//! End-to-end compilation tests over formula JSON and traffic requests.

use rad_core::time_range::{BaselineWindow, TimeRangeExpr};
use rad_query::{
    compile_formula, compile_traffic, AggregationNode, CompileContext, CompileError, Node,
    TimeBounds, TrafficRequest,
};
use serde_json::json;

const FORMULA: &str = r#"{
    "type": "binary_operation",
    "op": "/",
    "left": {
        "type": "function_call",
        "name": "count",
        "named_arguments": { "kql": "response.status: \"500\"" },
        "location": { "start": 0, "end": 33 }
    },
    "right": {
        "type": "function_call",
        "name": "moving_average",
        "arguments": [
            { "type": "function_call", "name": "count", "location": { "start": 51, "end": 58 } }
        ],
        "named_arguments": { "window": 5 },
        "location": { "start": 36, "end": 70 }
    }
}"#;

fn ctx() -> CompileContext {
    CompileContext {
        index: "traffic-*".into(),
        time_range: Some(TimeBounds {
            gte: "now-1d".into(),
            lt: "now".into(),
        }),
        ..Default::default()
    }
}

#[test]
fn compilation_is_idempotent_and_pure() {
    let ast: Node = serde_json::from_str(FORMULA).unwrap();
    let snapshot = ast.clone();

    let first = compile_formula(&ast, &ctx()).unwrap();
    let second = compile_formula(&ast, &ctx()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.document.to_search_body(), second.document.to_search_body());
    assert_eq!(ast, snapshot);
    // Bucket numbering restarts for every compilation.
    assert_eq!(second.metrics[0].bucket, "0-bucket");
}

#[test]
fn formula_search_body() {
    let ast: Node = serde_json::from_str(FORMULA).unwrap();
    let compiled = compile_formula(&ast, &ctx()).unwrap();
    let body = compiled.document.to_search_body();

    assert_eq!(body["size"], json!(0));
    assert_eq!(
        body["query"]["bool"]["filter"],
        json!([{ "range": { "@timestamp": { "gte": "now-1d", "lt": "now" } } }])
    );
    let aggs = &body["aggs"]["formula"]["aggs"];
    assert_eq!(
        aggs["0-bucket"],
        json!({
            "filter": { "match_phrase": { "response.status": "500" } },
            "aggs": { "metric": { "filter": { "match_all": {} } } }
        })
    );
    assert_eq!(aggs["1-bucket"], json!({ "filter": { "match_all": {} } }));

    assert_eq!(compiled.wrappers.len(), 1);
    assert_eq!(compiled.wrappers[0].function, "moving_average");
    assert_eq!(compiled.wrappers[0].wraps, "1-bucket");
}

#[test]
fn unknown_function_in_nested_position() {
    let ast: Node = serde_json::from_str(
        r#"{
            "type": "function_call",
            "name": "round",
            "arguments": [
                { "type": "function_call", "name": "medianish",
                  "arguments": [{ "type": "field_reference", "field": "x" }],
                  "location": { "start": 6, "end": 18 } }
            ]
        }"#,
    )
    .unwrap();
    let err = compile_formula(&ast, &ctx()).unwrap_err();
    assert!(matches!(err, CompileError::UnknownFunction { ref name, .. } if name == "medianish"));
    assert_eq!(err.to_string(), "Unknown function 'medianish' at 6..18");
}

#[test]
fn unknown_function_inside_wrapper_is_rejected() {
    let ast: Node = serde_json::from_str(
        r#"{
            "type": "function_call",
            "name": "moving_average",
            "arguments": [
                { "type": "function_call", "name": "median_of",
                  "arguments": [{ "type": "field_reference", "field": "x" }],
                  "location": { "start": 15, "end": 27 } }
            ]
        }"#,
    )
    .unwrap();
    let err = compile_formula(&ast, &ctx()).unwrap_err();
    assert_eq!(err.to_string(), "Unknown function 'median_of' at 15..27");
}

#[test]
fn traffic_request_with_zero_patterns_falls_back() {
    let req = TrafficRequest::new(
        "detail.event.data.traffic.eid.keyword",
        BaselineWindow::parse("2025-06-01", "2025-06-09").unwrap(),
        TimeRangeExpr::parse("now-12h").unwrap(),
        &[],
    );
    let compiled = compile_traffic(&req, &CompileContext::default()).unwrap();
    assert!(compiled.pattern_fallback);

    let body = compiled.document.to_search_body();
    let filters = body["query"]["bool"]["filter"].as_array().unwrap();
    assert_eq!(
        filters[0],
        json!({ "wildcard": { "detail.event.data.traffic.eid.keyword": {
            "value": "pandc.vnext.recommendations.feed.feed_*"
        } } })
    );
    assert!(matches!(compiled.document.root, AggregationNode::Terms(_)));
}

#[test]
fn traffic_compilation_is_deterministic() {
    let patterns = vec!["a.*".to_string(), "b.*".to_string()];
    let req = TrafficRequest::new(
        "eid",
        BaselineWindow::parse("2025-06-01", "2025-06-09").unwrap(),
        TimeRangeExpr::parse("now-1w").unwrap(),
        &patterns,
    );
    let a = compile_traffic(&req, &CompileContext::default()).unwrap();
    let b = compile_traffic(&req, &CompileContext::default()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.current.hours, 168.0);
}
