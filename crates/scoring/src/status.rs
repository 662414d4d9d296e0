use std::fmt;

use serde::{Deserialize, Serialize};

/// Health status derived from a deviation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Critical,
    Warning,
    Normal,
    Increased,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Critical,
        Status::Warning,
        Status::Normal,
        Status::Increased,
    ];

    /// First match wins: `<= -80` critical, `<= -50` warning, `> 0`
    /// increased, otherwise normal.
    pub fn from_score(score: i64) -> Self {
        if score <= -80 {
            Status::Critical
        } else if score <= -50 {
            Status::Warning
        } else if score > 0 {
            Status::Increased
        } else {
            Status::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Critical => "CRITICAL",
            Status::Warning => "WARNING",
            Status::Normal => "NORMAL",
            Status::Increased => "INCREASED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_exact() {
        assert_eq!(Status::from_score(-100), Status::Critical);
        assert_eq!(Status::from_score(-80), Status::Critical);
        assert_eq!(Status::from_score(-79), Status::Warning);
        assert_eq!(Status::from_score(-50), Status::Warning);
        assert_eq!(Status::from_score(-49), Status::Normal);
        assert_eq!(Status::from_score(0), Status::Normal);
        assert_eq!(Status::from_score(1), Status::Increased);
        assert_eq!(Status::from_score(250), Status::Increased);
    }

    #[test]
    fn serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Status::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(Status::Increased.to_string(), "INCREASED");
    }
}
