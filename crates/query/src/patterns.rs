//! Wildcard filters restricting queries to the enabled category patterns.

use rad_core::categories::DEFAULT_CATEGORY_PATTERN;

use crate::document::Clause;

/// The filter clause plus whether the built-in default pattern was used.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternFilter {
    pub clause: Clause,
    pub used_fallback: bool,
}

fn wildcard(field: &str, pattern: &str) -> Clause {
    Clause::Wildcard {
        field: field.to_string(),
        pattern: pattern.to_string(),
    }
}

/// Build the entity filter for a set of enabled glob patterns.
///
/// One pattern yields a single wildcard clause; several yield a `should`
/// with `minimum_should_match: 1`. Zero patterns fall back to the default
/// pattern, which is logged. An empty `should` is never produced.
pub fn build_pattern_filter(field: &str, patterns: &[String]) -> PatternFilter {
    let patterns: Vec<&str> = patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();

    match patterns.as_slice() {
        [] => {
            tracing::warn!(
                field,
                pattern = DEFAULT_CATEGORY_PATTERN,
                "no enabled category patterns, falling back to default pattern"
            );
            PatternFilter {
                clause: wildcard(field, DEFAULT_CATEGORY_PATTERN),
                used_fallback: true,
            }
        }
        [single] => PatternFilter {
            clause: wildcard(field, single),
            used_fallback: false,
        },
        many => PatternFilter {
            clause: Clause::any_of(many.iter().map(|p| wildcard(field, p)).collect()),
            used_fallback: false,
        },
    }
}
