//! Scoring scenarios over normalized traffic responses.

use rad_core::categories::{CategoryConfig, CategorySet};
use rad_core::time_range::{BaselineWindow, TimeRangeExpr};
use rad_executor::normalize;
use rad_scoring::{score_buckets, CategoryMatcher, ScoringConfig, Status};
use serde_json::{json, Value};

fn config() -> ScoringConfig {
    let baseline = BaselineWindow::parse("2025-06-01", "2025-06-09").unwrap();
    let current = TimeRangeExpr::parse("now-12h").unwrap().resolve(None).unwrap();
    ScoringConfig::new(&baseline, &current)
}

fn bucket(key: &str, baseline: u64, current: u64) -> Value {
    json!({
        "key": key,
        "doc_count": baseline + current,
        "baseline": { "doc_count": baseline },
        "current": { "doc_count": current }
    })
}

fn score(buckets: Vec<Value>, matcher: &CategoryMatcher) -> rad_scoring::ScoreReport {
    let raw = json!({ "aggregations": { "events": { "buckets": buckets } } });
    let response = normalize(&raw);
    let events = response.aggregation("events").unwrap();
    score_buckets(events.buckets(), &config(), matcher)
}

#[test]
fn config_from_baseline_and_current_window() {
    let config = config();
    assert_eq!(config.baseline_days, 8);
    assert_eq!(config.current_hours, 12.0);
}

#[test]
fn moderate_drop_is_normal() {
    let report = score(vec![bucket("feed_home", 8000, 300)], &CategoryMatcher::default());
    let record = &report.records[0];
    assert_eq!(record.daily_average, 1000.0);
    assert!((record.baseline_period_count - 500.0).abs() < 1e-9);
    assert_eq!(record.score, -40);
    assert_eq!(record.status, Status::Normal);
}

#[test]
fn steep_drop_is_critical() {
    let report = score(vec![bucket("feed_home", 8000, 50)], &CategoryMatcher::default());
    assert_eq!(report.records[0].score, -90);
    assert_eq!(report.records[0].status, Status::Critical);
}

#[test]
fn low_volume_is_excluded() {
    // 400 over 8 days is a daily average of 50.
    let report = score(
        vec![bucket("quiet", 400, 0), bucket("quieter", 400, 10_000)],
        &CategoryMatcher::default(),
    );
    assert!(report.records.is_empty());
    assert_eq!(report.skipped.low_volume, 2);
    assert_eq!(report.skipped.no_baseline, 0);
}

#[test]
fn missing_baseline_is_excluded_and_counted() {
    let raw_bucket = json!({ "key": "new_event", "doc_count": 90, "current": { "doc_count": 90 } });
    let report = score(vec![raw_bucket, bucket("zero", 0, 5)], &CategoryMatcher::default());
    assert!(report.records.is_empty());
    assert_eq!(report.skipped.no_baseline, 2);
}

#[test]
fn records_sorted_worst_first_and_stable() {
    let report = score(
        vec![
            bucket("b_up", 8000, 1000),
            bucket("c_same_1", 8000, 500),
            bucket("a_down", 8000, 50),
            bucket("d_same_2", 8000, 500),
        ],
        &CategoryMatcher::default(),
    );
    let ids: Vec<&str> = report.records.iter().map(|r| r.entity_id.as_str()).collect();
    assert_eq!(ids, vec!["a_down", "c_same_1", "d_same_2", "b_up"]);

    assert_eq!(report.summary.critical, 1);
    assert_eq!(report.summary.normal, 2);
    assert_eq!(report.summary.increased, 1);
    assert_eq!(report.summary.total, 4);
}

#[test]
fn categories_and_display_names() {
    let mut set = CategorySet::default();
    set.insert(
        "feed",
        CategoryConfig {
            pattern: "pandc.vnext.recommendations.feed.feed_*".into(),
            enabled: true,
            display_name: "Feed".into(),
        },
    );
    set.insert(
        "metadata",
        CategoryConfig {
            pattern: "pandc.vnext.recommendations.metadata.*".into(),
            enabled: true,
            display_name: "Metadata".into(),
        },
    );
    let matcher = CategoryMatcher::new(&set).unwrap();

    let report = score(
        vec![
            bucket("pandc.vnext.recommendations.feed.feed_homepage", 8000, 500),
            bucket("pandc.vnext.recommendations.metadata.lookup", 8000, 500),
            bucket("other.service.call", 8000, 500),
        ],
        &matcher,
    );
    let by_id = |id: &str| report.records.iter().find(|r| r.entity_id == id).unwrap();

    let feed = by_id("pandc.vnext.recommendations.feed.feed_homepage");
    assert_eq!(feed.category, "feed");
    assert_eq!(feed.display_name, "homepage");

    let metadata = by_id("pandc.vnext.recommendations.metadata.lookup");
    assert_eq!(metadata.category, "metadata");
    assert_eq!(metadata.display_name, "lookup");

    let other = by_id("other.service.call");
    assert_eq!(other.category, "unknown");
    assert_eq!(other.display_name, "other.service.call");
}

#[test]
fn record_serializes_for_the_dashboard() {
    let report = score(vec![bucket("feed_home", 8000, 50)], &CategoryMatcher::default());
    let value = serde_json::to_value(&report.records[0]).unwrap();
    assert_eq!(value["entityId"], json!("feed_home"));
    assert_eq!(value["currentCount"], json!(50));
    assert_eq!(value["status"], json!("CRITICAL"));
    assert!(value.get("baselinePeriodCount").is_some());
}
