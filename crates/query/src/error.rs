use rad_core::TimeRangeError;

use crate::ast::Location;

fn at(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!(" at {}", loc),
        None => String::new(),
    }
}

/// Errors surfaced synchronously by the query compiler. Never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("Unknown function '{name}'{}", at(.location))]
    UnknownFunction {
        name: String,
        location: Option<Location>,
    },

    #[error("Function '{function}' requires a field argument{}", at(.location))]
    MissingField {
        function: String,
        location: Option<Location>,
    },

    #[error("Invalid argument '{argument}' for '{function}': {reason}{}", at(.location))]
    InvalidArgument {
        function: String,
        argument: String,
        reason: String,
        location: Option<Location>,
    },

    #[error("Time range error: {0}")]
    TimeRange(#[from] TimeRangeError),
}
