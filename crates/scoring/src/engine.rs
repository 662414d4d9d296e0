//! Baseline-vs-current deviation scoring.
//!
//! Per entity bucket:
//!
//! - `baseline_period = baseline / baseline_days / 24 * current_hours`,
//!   the baseline rescaled to the current window's duration. Zero means no
//!   signal and the bucket is skipped.
//! - `daily_average = baseline / baseline_days`. Below the medium-volume
//!   threshold the bucket is skipped.
//! - `ratio = current / baseline_period`. Drops below the tier threshold
//!   (0.5 for high volume, 0.3 otherwise) score `round((1 - ratio) * -100)`,
//!   everything else scores `round((ratio - 1) * 100)`.
//!
//! Skips are not errors; they are counted in [`SkipCounters`].

use rad_core::config::MonitorConfig;
use rad_core::time_range::{BaselineWindow, ResolvedRange};
use rad_executor::NormalizedBucket;
use rad_query::request::{BASELINE_AGG, CURRENT_AGG};
use serde::Serialize;

use crate::categories::CategoryMatcher;
use crate::status::Status;
use crate::summary::{ScoreReport, SkipCounters, StatusSummary};

pub const DEFAULT_HIGH_VOLUME_THRESHOLD: f64 = 1000.0;
pub const DEFAULT_MEDIUM_VOLUME_THRESHOLD: f64 = 100.0;

/// Drop ratio below which high-volume entities score as a drop.
const HIGH_VOLUME_DROP_RATIO: f64 = 0.5;
/// Drop ratio below which medium-volume entities score as a drop.
const MEDIUM_VOLUME_DROP_RATIO: f64 = 0.3;

const HOURS_PER_DAY: f64 = 24.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Baseline length in whole days, rounded up.
    pub baseline_days: u32,
    /// Duration of the resolved current window.
    pub current_hours: f64,
    pub high_volume_threshold: f64,
    pub medium_volume_threshold: f64,
}

impl ScoringConfig {
    pub fn new(baseline: &BaselineWindow, current: &ResolvedRange) -> Self {
        Self {
            baseline_days: baseline.days(),
            current_hours: current.hours,
            high_volume_threshold: DEFAULT_HIGH_VOLUME_THRESHOLD,
            medium_volume_threshold: DEFAULT_MEDIUM_VOLUME_THRESHOLD,
        }
    }

    pub fn with_thresholds(mut self, monitor: &MonitorConfig) -> Self {
        self.high_volume_threshold = monitor.high_volume_threshold;
        self.medium_volume_threshold = monitor.medium_volume_threshold;
        self
    }
}

/// One scored entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub entity_id: String,
    pub display_name: String,
    pub current_count: u64,
    pub baseline_period_count: f64,
    pub daily_average: f64,
    pub score: i64,
    pub status: Status,
    pub category: String,
}

/// Half-up rounding: `-40.5` rounds to `-40`, `40.5` to `41`.
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Score a current count against a rescaled baseline.
///
/// `baseline_period` must be positive.
pub fn compute_score(current: f64, baseline_period: f64, daily_average: f64, config: &ScoringConfig) -> i64 {
    let ratio = current / baseline_period;
    let drop_ratio = if daily_average >= config.high_volume_threshold {
        HIGH_VOLUME_DROP_RATIO
    } else {
        MEDIUM_VOLUME_DROP_RATIO
    };
    if ratio < drop_ratio {
        round_half_up((1.0 - ratio) * -100.0)
    } else {
        round_half_up((ratio - 1.0) * 100.0)
    }
}

/// Score every entity bucket of a traffic query.
///
/// Records are stably sorted by score ascending, worst first.
pub fn score_buckets(
    buckets: &[NormalizedBucket],
    config: &ScoringConfig,
    matcher: &CategoryMatcher,
) -> ScoreReport {
    let days = f64::from(config.baseline_days.max(1));
    let mut skipped = SkipCounters::default();
    let mut records = Vec::with_capacity(buckets.len());

    for bucket in buckets {
        let entity_id = bucket.key_string();
        let baseline = bucket.doc_count_of(BASELINE_AGG).unwrap_or(0) as f64;
        let current = bucket.doc_count_of(CURRENT_AGG).unwrap_or(0);

        let baseline_period = baseline / days / HOURS_PER_DAY * config.current_hours;
        if baseline_period <= 0.0 {
            tracing::debug!(entity_id = %entity_id, "no baseline signal, skipping");
            skipped.no_baseline += 1;
            continue;
        }

        let daily_average = baseline / days;
        if daily_average < config.medium_volume_threshold {
            tracing::debug!(entity_id = %entity_id, daily_average, "below volume threshold, skipping");
            skipped.low_volume += 1;
            continue;
        }

        let score = compute_score(current as f64, baseline_period, daily_average, config);
        let category = matcher.classify(&entity_id);
        records.push(EventRecord {
            display_name: category.display_name.to_string(),
            category: category.category.to_string(),
            entity_id: entity_id.clone(),
            current_count: current,
            baseline_period_count: baseline_period,
            daily_average,
            score,
            status: Status::from_score(score),
        });
    }

    records.sort_by_key(|r| r.score);
    let summary = StatusSummary::from_records(&records);

    tracing::info!(
        buckets = buckets.len(),
        scored = records.len(),
        critical = summary.critical,
        warning = summary.warning,
        skipped_no_baseline = skipped.no_baseline,
        skipped_low_volume = skipped.low_volume,
        "scoring pass complete"
    );

    ScoreReport {
        records,
        summary,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScoringConfig {
        ScoringConfig {
            baseline_days: 8,
            current_hours: 12.0,
            high_volume_threshold: 1000.0,
            medium_volume_threshold: 100.0,
        }
    }

    #[test]
    fn half_up_rounding() {
        assert_eq!(round_half_up(-40.5), -40);
        assert_eq!(round_half_up(40.5), 41);
        assert_eq!(round_half_up(-89.6), -90);
        assert_eq!(round_half_up(0.49), 0);
    }

    #[test]
    fn high_volume_tier_threshold() {
        // daily_average 1000, baseline_period 500
        assert_eq!(compute_score(300.0, 500.0, 1000.0, &config()), -40);
        assert_eq!(compute_score(50.0, 500.0, 1000.0, &config()), -90);
        assert_eq!(compute_score(500.0, 500.0, 1000.0, &config()), 0);
        assert_eq!(compute_score(1000.0, 500.0, 1000.0, &config()), 100);
    }

    #[test]
    fn medium_volume_tier_threshold() {
        assert_eq!(compute_score(100.0, 500.0, 999.0, &config()), -80);
        assert_eq!(compute_score(200.0, 500.0, 999.0, &config()), -60);
        assert_eq!(compute_score(0.0, 500.0, 999.0, &config()), -100);
    }

    #[test]
    fn score_is_monotonic_in_current_count() {
        for daily_average in [150.0, 1000.0, 5000.0] {
            let mut previous = i64::MIN;
            for current in 0..=2000 {
                let score = compute_score(current as f64, 500.0, daily_average, &config());
                assert!(
                    score >= previous,
                    "score dropped at current={current}, daily_average={daily_average}"
                );
                previous = score;
            }
        }
    }
}
