//! Category configuration: ordered glob patterns that classify entity IDs.
//!
//! Loaded from YAML:
//!
//! ```yaml
//! categories:
//!   feed:
//!     pattern: "pandc.vnext.recommendations.feed.feed_*"
//!     enabled: true
//!     display_name: Feed
//!   metadata:
//!     pattern: "pandc.vnext.recommendations.metadata.*"
//!     enabled: false
//!     display_name: Metadata
//! ```
//!
//! Declaration order is significant: classification is first-match-wins.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pattern used when no category is enabled.
pub const DEFAULT_CATEGORY_PATTERN: &str = "pandc.vnext.recommendations.feed.feed_*";

/// Prefix stripped from entity IDs that match no category.
pub const LEGACY_DISPLAY_PREFIX: &str = "pandc.vnext.recommendations.feed.feed_";

/// Category key assigned when no pattern matches.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// A single configured category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CategoryConfig {
    /// Glob pattern; `*` matches any run of characters.
    pub pattern: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, alias = "displayName")]
    pub display_name: String,
}

fn default_enabled() -> bool {
    true
}

impl CategoryConfig {
    /// Literal text before the first `*`.
    pub fn prefix(&self) -> &str {
        match self.pattern.find('*') {
            Some(idx) => &self.pattern[..idx],
            None => &self.pattern,
        }
    }
}

/// Ordered category set keyed by category key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CategorySet {
    #[serde(default)]
    pub categories: IndexMap<String, CategoryConfig>,
}

impl CategorySet {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let set: CategorySet = serde_yaml::from_str(yaml)?;
        set.validate()?;
        Ok(set)
    }

    /// Load from a YAML file. A missing file yields an empty set.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "category file not found, using empty category set");
            return Ok(Self::default());
        }
        let yaml = std::fs::read_to_string(path)?;
        let set = Self::from_yaml(&yaml)?;
        tracing::info!(
            path = %path.display(),
            total = set.categories.len(),
            enabled = set.enabled().count(),
            "loaded category configuration"
        );
        Ok(set)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, category) in &self.categories {
            if category.pattern.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "category '{}' has an empty pattern",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Enabled categories in declaration order.
    pub fn enabled(&self) -> impl Iterator<Item = (&str, &CategoryConfig)> {
        self.categories
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(k, c)| (k.as_str(), c))
    }

    /// Enabled glob patterns, cloned so callers never hold a reference
    /// into shared configuration.
    pub fn enabled_patterns(&self) -> Vec<String> {
        self.enabled().map(|(_, c)| c.pattern.clone()).collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, category: CategoryConfig) {
        self.categories.insert(key.into(), category);
    }
}
