//! Time-range expressions for the current observation window, and the
//! fixed baseline window it is compared against.
//!
//! Accepted current-window forms:
//! - `now-<N><unit>`: the last N units up to now
//! - `inspection_time`: an explicit window supplied by the caller
//! - `-<N><unit>-<M><unit>`: from N units ago to M units ago
//!
//! Units are `h`, `d` and `w`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimeRangeError;

const SECONDS_PER_DAY: i64 = 86_400;

/// Sentinel expression resolved from a caller-supplied window.
pub const INSPECTION_TIME: &str = "inspection_time";

/// Unit of a relative offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Hour,
    Day,
    Week,
}

impl TimeUnit {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'h' => Some(TimeUnit::Hour),
            'd' => Some(TimeUnit::Day),
            'w' => Some(TimeUnit::Week),
            _ => None,
        }
    }

    pub fn suffix(self) -> char {
        match self {
            TimeUnit::Hour => 'h',
            TimeUnit::Day => 'd',
            TimeUnit::Week => 'w',
        }
    }

    pub fn hours(self) -> u64 {
        match self {
            TimeUnit::Hour => 1,
            TimeUnit::Day => 24,
            TimeUnit::Week => 24 * 7,
        }
    }
}

/// An explicit window used to resolve `inspection_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Parsed current-window expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeRangeExpr {
    /// `now-<N><unit>`
    Relative { amount: u32, unit: TimeUnit },
    /// `inspection_time`
    InspectionTime,
    /// `-<N><unit>-<M><unit>`
    Offset {
        start: u32,
        start_unit: TimeUnit,
        end: u32,
        end_unit: TimeUnit,
    },
}

/// A resolved half-open range `[gte, lt)` in Elasticsearch date syntax,
/// plus its duration in hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRange {
    pub gte: String,
    pub lt: String,
    pub hours: f64,
}

/// Split `<digits><unit>` off the front of `s`, returning the remainder.
fn take_amount_unit(s: &str) -> Option<(u32, TimeUnit, &str)> {
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let amount: u32 = s[..digits].parse().ok()?;
    let mut rest = s[digits..].chars();
    let unit = TimeUnit::from_char(rest.next()?)?;
    if amount == 0 {
        return None;
    }
    Some((amount, unit, rest.as_str()))
}

impl TimeRangeExpr {
    pub fn parse(expr: &str) -> Result<Self, TimeRangeError> {
        let trimmed = expr.trim();
        let invalid = || TimeRangeError::InvalidExpression(expr.to_string());

        if trimmed == INSPECTION_TIME {
            return Ok(TimeRangeExpr::InspectionTime);
        }

        if let Some(rest) = trimmed.strip_prefix("now-") {
            return match take_amount_unit(rest) {
                Some((amount, unit, "")) => Ok(TimeRangeExpr::Relative { amount, unit }),
                _ => Err(invalid()),
            };
        }

        if let Some(rest) = trimmed.strip_prefix('-') {
            let (start, start_unit, rest) = take_amount_unit(rest).ok_or_else(invalid)?;
            let rest = rest.strip_prefix('-').ok_or_else(invalid)?;
            let (end, end_unit, rest) = take_amount_unit(rest).ok_or_else(invalid)?;
            if !rest.is_empty() {
                return Err(invalid());
            }
            if u64::from(start) * start_unit.hours() <= u64::from(end) * end_unit.hours() {
                return Err(TimeRangeError::InvertedRange(expr.to_string()));
            }
            return Ok(TimeRangeExpr::Offset {
                start,
                start_unit,
                end,
                end_unit,
            });
        }

        Err(invalid())
    }

    /// Duration of the window in hours, when it is known without a caller window.
    pub fn hours(&self) -> Option<f64> {
        match *self {
            TimeRangeExpr::Relative { amount, unit } => {
                Some((u64::from(amount) * unit.hours()) as f64)
            }
            TimeRangeExpr::Offset {
                start,
                start_unit,
                end,
                end_unit,
            } => Some(
                (u64::from(start) * start_unit.hours() - u64::from(end) * end_unit.hours()) as f64,
            ),
            TimeRangeExpr::InspectionTime => None,
        }
    }

    /// Resolve into Elasticsearch range bounds.
    ///
    /// Relative forms stay in date-math (`now-12h`) so that the rendered
    /// query is stable across polls and remains cacheable.
    pub fn resolve(
        &self,
        inspection: Option<&InspectionWindow>,
    ) -> Result<ResolvedRange, TimeRangeError> {
        match *self {
            TimeRangeExpr::Relative { amount, unit } => Ok(ResolvedRange {
                gte: format!("now-{}{}", amount, unit.suffix()),
                lt: "now".to_string(),
                hours: (u64::from(amount) * unit.hours()) as f64,
            }),
            TimeRangeExpr::Offset {
                start,
                start_unit,
                end,
                end_unit,
            } => Ok(ResolvedRange {
                gte: format!("now-{}{}", start, start_unit.suffix()),
                lt: format!("now-{}{}", end, end_unit.suffix()),
                hours: self.hours().unwrap_or_default(),
            }),
            TimeRangeExpr::InspectionTime => {
                let window = inspection.ok_or(TimeRangeError::MissingInspectionWindow)?;
                let seconds = (window.to - window.from).num_seconds();
                if seconds <= 0 {
                    return Err(TimeRangeError::InvertedRange(INSPECTION_TIME.to_string()));
                }
                Ok(ResolvedRange {
                    gte: window.from.to_rfc3339(),
                    lt: window.to.to_rfc3339(),
                    hours: seconds as f64 / 3600.0,
                })
            }
        }
    }
}

impl FromStr for TimeRangeExpr {
    type Err = TimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRangeExpr::parse(s)
    }
}

impl fmt::Display for TimeRangeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TimeRangeExpr::Relative { amount, unit } => {
                write!(f, "now-{}{}", amount, unit.suffix())
            }
            TimeRangeExpr::InspectionTime => f.write_str(INSPECTION_TIME),
            TimeRangeExpr::Offset {
                start,
                start_unit,
                end,
                end_unit,
            } => write!(
                f,
                "-{}{}-{}{}",
                start,
                start_unit.suffix(),
                end,
                end_unit.suffix()
            ),
        }
    }
}

// ── Baseline window ──────────────────────────────────────────────────

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, TimeRangeError> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| TimeRangeError::InvalidDate(raw.to_string()))
}

impl InspectionWindow {
    /// Parse `[from, to)` from dates or RFC 3339 instants.
    pub fn parse(from: &str, to: &str) -> Result<Self, TimeRangeError> {
        let window = Self {
            from: parse_instant(from)?,
            to: parse_instant(to)?,
        };
        if window.to <= window.from {
            return Err(TimeRangeError::InvertedRange(format!("{}..{}", from.trim(), to.trim())));
        }
        Ok(window)
    }
}

/// Historical reference window `[start, end)`.
///
/// The original strings are kept verbatim for the rendered range clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineWindow {
    pub start: String,
    pub end: String,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
}

impl BaselineWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeRangeError> {
        let start_at = parse_instant(start)?;
        let end_at = parse_instant(end)?;
        if end_at <= start_at {
            return Err(TimeRangeError::EmptyBaseline {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            start: start.trim().to_string(),
            end: end.trim().to_string(),
            start_at,
            end_at,
        })
    }

    /// Length of the window in whole days, rounded up.
    pub fn days(&self) -> u32 {
        let seconds = (self.end_at - self.start_at).num_seconds();
        let days = (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
        days.max(1) as u32
    }

    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    pub fn end_at(&self) -> DateTime<Utc> {
        self.end_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_relative_hours() {
        let expr = TimeRangeExpr::parse("now-12h").unwrap();
        assert_eq!(
            expr,
            TimeRangeExpr::Relative {
                amount: 12,
                unit: TimeUnit::Hour
            }
        );
        assert_eq!(expr.hours(), Some(12.0));
    }

    #[test]
    fn parses_relative_days_and_weeks() {
        assert_eq!(TimeRangeExpr::parse("now-2d").unwrap().hours(), Some(48.0));
        assert_eq!(TimeRangeExpr::parse("now-1w").unwrap().hours(), Some(168.0));
    }

    #[test]
    fn parses_offset_window() {
        let expr = TimeRangeExpr::parse("-3h-1h").unwrap();
        assert_eq!(expr.hours(), Some(2.0));
        let resolved = expr.resolve(None).unwrap();
        assert_eq!(resolved.gte, "now-3h");
        assert_eq!(resolved.lt, "now-1h");
        assert_eq!(expr.to_string(), "-3h-1h");
    }

    #[test]
    fn offset_mixing_units() {
        let expr = TimeRangeExpr::parse("-2d-12h").unwrap();
        assert_eq!(expr.hours(), Some(36.0));
    }

    #[test]
    fn inverted_offset_rejected() {
        assert!(matches!(
            TimeRangeExpr::parse("-1h-3h"),
            Err(TimeRangeError::InvertedRange(_))
        ));
    }

    #[test]
    fn rejects_malformed_expressions() {
        for bad in ["", "now", "now-", "now-12", "now-12m", "now-0h", "12h", "-3h", "-3h-", "now-12h ago", "yesterday"] {
            assert!(
                TimeRangeExpr::parse(bad).is_err(),
                "expected '{}' to be rejected",
                bad
            );
        }
    }

    #[test]
    fn inspection_time_needs_window() {
        let expr = TimeRangeExpr::parse("inspection_time").unwrap();
        assert_eq!(expr.hours(), None);
        assert_eq!(
            expr.resolve(None),
            Err(TimeRangeError::MissingInspectionWindow)
        );

        let window = InspectionWindow {
            from: Utc.with_ymd_and_hms(2025, 6, 9, 0, 0, 0).unwrap(),
            to: Utc.with_ymd_and_hms(2025, 6, 9, 6, 0, 0).unwrap(),
        };
        let resolved = expr.resolve(Some(&window)).unwrap();
        assert_eq!(resolved.hours, 6.0);
        assert!(resolved.gte.starts_with("2025-06-09T00:00:00"));
    }

    #[test]
    fn relative_resolves_to_date_math() {
        let resolved = TimeRangeExpr::parse("now-12h").unwrap().resolve(None).unwrap();
        assert_eq!(resolved.gte, "now-12h");
        assert_eq!(resolved.lt, "now");
        assert_eq!(resolved.hours, 12.0);
    }

    #[test]
    fn baseline_days_from_dates() {
        let window = BaselineWindow::parse("2025-06-01", "2025-06-09").unwrap();
        assert_eq!(window.days(), 8);
    }

    #[test]
    fn baseline_partial_day_rounds_up() {
        let window =
            BaselineWindow::parse("2025-06-01T00:00:00Z", "2025-06-03T06:00:00Z").unwrap();
        assert_eq!(window.days(), 3);
    }

    #[test]
    fn baseline_rejects_empty_or_bad_dates() {
        assert!(matches!(
            BaselineWindow::parse("2025-06-09", "2025-06-01"),
            Err(TimeRangeError::EmptyBaseline { .. })
        ));
        assert!(matches!(
            BaselineWindow::parse("June 1st", "2025-06-09"),
            Err(TimeRangeError::InvalidDate(_))
        ));
    }

    #[test]
    fn inspection_window_from_strings() {
        let window = InspectionWindow::parse("2025-06-09T00:00:00Z", "2025-06-09T06:00:00Z").unwrap();
        let resolved = TimeRangeExpr::InspectionTime.resolve(Some(&window)).unwrap();
        assert_eq!(resolved.hours, 6.0);
        assert_eq!(resolved.gte, "2025-06-09T00:00:00+00:00");

        assert!(matches!(
            InspectionWindow::parse("2025-06-09T06:00:00Z", "2025-06-09T00:00:00Z"),
            Err(TimeRangeError::InvertedRange(_))
        ));
        assert!(matches!(
            InspectionWindow::parse("yesterday", "2025-06-09"),
            Err(TimeRangeError::InvalidDate(_))
        ));
    }
}
