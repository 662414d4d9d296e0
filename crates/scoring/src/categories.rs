//! First-match-wins category classification over precompiled globs.

use rad_core::categories::{CategorySet, LEGACY_DISPLAY_PREFIX, UNKNOWN_CATEGORY};
use regex::Regex;

use crate::error::ScoringError;

/// Glob to anchored regex: metacharacters escaped, `*` matches any run.
fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("^{}$", escaped))
}

#[derive(Debug, Clone)]
struct CompiledCategory {
    key: String,
    display_name: String,
    prefix: String,
    regex: Regex,
}

/// Result of classifying one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMatch<'a> {
    /// Category key, `unknown` when nothing matched.
    pub category: &'a str,
    pub category_display_name: Option<&'a str>,
    /// Entity ID with the category prefix removed.
    pub display_name: &'a str,
}

/// Enabled categories compiled once per scoring pass.
#[derive(Debug, Clone, Default)]
pub struct CategoryMatcher {
    categories: Vec<CompiledCategory>,
}

impl CategoryMatcher {
    pub fn new(set: &CategorySet) -> Result<Self, ScoringError> {
        let categories = set
            .enabled()
            .map(|(key, config)| {
                let regex = glob_to_regex(&config.pattern).map_err(|source| {
                    ScoringError::InvalidPattern {
                        key: key.to_string(),
                        source,
                    }
                })?;
                Ok(CompiledCategory {
                    key: key.to_string(),
                    display_name: config.display_name.clone(),
                    prefix: config.prefix().to_string(),
                    regex,
                })
            })
            .collect::<Result<Vec<_>, ScoringError>>()?;
        Ok(Self { categories })
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn classify<'a>(&'a self, entity_id: &'a str) -> CategoryMatch<'a> {
        match self.categories.iter().find(|c| c.regex.is_match(entity_id)) {
            Some(c) => CategoryMatch {
                category: &c.key,
                category_display_name: Some(&c.display_name),
                display_name: entity_id.strip_prefix(c.prefix.as_str()).unwrap_or(entity_id),
            },
            None => CategoryMatch {
                category: UNKNOWN_CATEGORY,
                category_display_name: None,
                display_name: entity_id
                    .strip_prefix(LEGACY_DISPLAY_PREFIX)
                    .unwrap_or(entity_id),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rad_core::CategoryConfig;

    fn set(entries: &[(&str, &str, bool)]) -> CategorySet {
        let mut set = CategorySet::default();
        for (key, pattern, enabled) in entries {
            set.insert(
                *key,
                CategoryConfig {
                    pattern: pattern.to_string(),
                    enabled: *enabled,
                    display_name: key.to_uppercase(),
                },
            );
        }
        set
    }

    #[test]
    fn first_match_wins() {
        let matcher = CategoryMatcher::new(&set(&[
            ("specific", "app.feed.home_*", true),
            ("feed", "app.feed.*", true),
        ]))
        .unwrap();
        let m = matcher.classify("app.feed.home_top");
        assert_eq!(m.category, "specific");
        assert_eq!(m.display_name, "top");

        let m = matcher.classify("app.feed.search");
        assert_eq!(m.category, "feed");
        assert_eq!(m.display_name, "search");
    }

    #[test]
    fn disabled_categories_are_skipped() {
        let matcher = CategoryMatcher::new(&set(&[("feed", "app.feed.*", false)])).unwrap();
        assert!(matcher.is_empty());
        assert_eq!(matcher.classify("app.feed.x").category, UNKNOWN_CATEGORY);
    }

    #[test]
    fn metacharacters_are_literal() {
        let matcher = CategoryMatcher::new(&set(&[("dotted", "a.b*", true)])).unwrap();
        assert_eq!(matcher.classify("a.bcd").category, "dotted");
        // `.` must not match an arbitrary character.
        assert_eq!(matcher.classify("axbcd").category, UNKNOWN_CATEGORY);
    }

    #[test]
    fn patterns_are_anchored() {
        let matcher = CategoryMatcher::new(&set(&[("feed", "feed_*", true)])).unwrap();
        assert_eq!(matcher.classify("x.feed_home").category, UNKNOWN_CATEGORY);
    }

    #[test]
    fn unmatched_strips_legacy_prefix() {
        let matcher = CategoryMatcher::default();
        let m = matcher.classify("pandc.vnext.recommendations.feed.feed_homepage");
        assert_eq!(m.category, "unknown");
        assert_eq!(m.display_name, "homepage");
        assert_eq!(m.category_display_name, None);
        assert_eq!(matcher.classify("other.event").display_name, "other.event");
    }
}
