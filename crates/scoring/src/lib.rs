//! Anomaly scoring for the traffic monitor.
//!
//! Converts per-entity baseline/current counts into a deviation score,
//! maps the score to a status and classifies each entity into a
//! configured category.

pub mod categories;
pub mod engine;
pub mod error;
pub mod status;
pub mod summary;

pub use categories::{CategoryMatch, CategoryMatcher};
pub use engine::{compute_score, score_buckets, EventRecord, ScoringConfig};
pub use error::ScoringError;
pub use status::Status;
pub use summary::{ScoreReport, SkipCounters, StatusSummary};
