fn status_prefix(status: &Option<u16>) -> String {
    match status {
        Some(s) => format!("HTTP {}: ", s),
        None => String::new(),
    }
}

/// Failure reported by a search transport.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}{message}", status_prefix(.status))]
pub struct TransportError {
    /// HTTP status, absent for connection-level failures.
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Outcome of a failed execution. Shared by every coalesced waiter, so it
/// is cheap to clone.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecuteError {
    #[error("Search failed after {elapsed_ms}ms: {source}")]
    Transport {
        source: TransportError,
        elapsed_ms: u64,
    },

    #[error("Search timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl ExecuteError {
    /// HTTP status of the underlying transport failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExecuteError::Transport { source, .. } => source.status,
            ExecuteError::Timeout { .. } => None,
        }
    }
}
