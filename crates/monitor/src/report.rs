//! Human-readable report output.

use rad_executor::{ExecutorStats, PerformanceReport};
use rad_scoring::{ScoreReport, Status};

const NAME_WIDTH: usize = 40;

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let head: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

/// Render the scored records as a fixed-width table plus summary lines.
pub fn render_table(report: &ScoreReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<10} {:>6} {:>9} {:>11} {:>10}  {:<12} {}\n",
        "STATUS", "SCORE", "CURRENT", "BASELINE", "DAILY AVG", "CATEGORY", "EVENT"
    ));
    for r in &report.records {
        out.push_str(&format!(
            "{:<10} {:>6} {:>9} {:>11.1} {:>10.1}  {:<12} {}\n",
            r.status.as_str(),
            r.score,
            r.current_count,
            r.baseline_period_count,
            r.daily_average,
            truncate(&r.category, 12),
            truncate(&r.display_name, NAME_WIDTH),
        ));
    }

    let counts: Vec<String> = Status::ALL
        .iter()
        .map(|s| format!("{}={}", s.as_str(), report.summary.count(*s)))
        .collect();
    out.push_str(&format!(
        "\n{} events scored ({}); skipped: {} without baseline, {} low volume\n",
        report.summary.total,
        counts.join(" "),
        report.skipped.no_baseline,
        report.skipped.low_volume,
    ));
    out
}

pub fn render_performance(stats: &ExecutorStats, perf: &PerformanceReport) -> String {
    format!(
        "cache: {} entries, {} hits, {} misses ({:.0}% hit rate), {} coalesced | queries: {} ok, {} failed, {} slow | latency ms avg {:.0} p50 {:.0} p95 {:.0} p99 {:.0} max {:.0}",
        stats.entries,
        stats.hits,
        stats.misses,
        stats.hit_rate * 100.0,
        stats.coalesced,
        perf.successes,
        perf.failures,
        perf.slow,
        perf.avg_ms,
        perf.p50_ms,
        perf.p95_ms,
        perf.p99_ms,
        perf.max_ms,
    )
}
