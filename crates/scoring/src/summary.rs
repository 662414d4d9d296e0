use serde::Serialize;

use crate::engine::EventRecord;
use crate::status::Status;

/// Record counts per status, for summary cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub critical: usize,
    pub warning: usize,
    pub normal: usize,
    pub increased: usize,
    pub total: usize,
}

impl StatusSummary {
    pub fn from_records(records: &[EventRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            summary.add(record.status);
        }
        summary
    }

    fn add(&mut self, status: Status) {
        match status {
            Status::Critical => self.critical += 1,
            Status::Warning => self.warning += 1,
            Status::Normal => self.normal += 1,
            Status::Increased => self.increased += 1,
        }
        self.total += 1;
    }

    pub fn count(&self, status: Status) -> usize {
        match status {
            Status::Critical => self.critical,
            Status::Warning => self.warning,
            Status::Normal => self.normal,
            Status::Increased => self.increased,
        }
    }
}

/// Buckets excluded from a scoring pass, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipCounters {
    /// Rescaled baseline was zero.
    pub no_baseline: usize,
    /// Daily average below the medium-volume threshold.
    pub low_volume: usize,
}

impl SkipCounters {
    pub fn total(&self) -> usize {
        self.no_baseline + self.low_volume
    }
}

/// Output of one scoring pass: records worst first, plus counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreReport {
    pub records: Vec<EventRecord>,
    pub summary: StatusSummary,
    pub skipped: SkipCounters,
}
