use thiserror::Error;

/// Errors raised while parsing time-range expressions and baseline dates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeRangeError {
    #[error("Invalid time range expression '{0}': expected now-<N><h|d|w>, inspection_time, or -<N><unit>-<M><unit>")]
    InvalidExpression(String),

    #[error("Invalid time range '{0}': start offset must be further in the past than end offset")]
    InvertedRange(String),

    #[error("Invalid date '{0}': expected YYYY-MM-DD or RFC 3339")]
    InvalidDate(String),

    #[error("Baseline end {end} must be after baseline start {start}")]
    EmptyBaseline { start: String, end: String },

    #[error("inspection_time requires an explicit window from the caller")]
    MissingInspectionWindow,

    #[error("Inspection window needs both a start and an end")]
    IncompleteInspectionWindow,
}

/// Errors raised while loading configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
