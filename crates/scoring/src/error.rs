/// Errors raised while preparing a scoring pass.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Invalid pattern for category '{key}': {source}")]
    InvalidPattern {
        key: String,
        #[source]
        source: regex::Error,
    },
}
