//! Tagging configuration.
//!
//! Configuration is injected into the repositories at construction time. It can
//! be built in code, deserialized from a host application's config file, or
//! read from `TAGGABLE_*` environment variables.
//!
//! # Example
//!
//! ```
//! use taggable_core::{Normalizer, TaggingConfig};
//!
//! let config = TaggingConfig::default()
//!     .with_delimiters(",;")
//!     .unwrap()
//!     .with_normalizer(Normalizer::CollapseWhitespace);
//!
//! assert_eq!(config.glue(), ',');
//! assert_eq!(config.split("Rust;  Web  Dev,,"), vec!["Rust", "Web  Dev"]);
//! assert_eq!(config.normalize("  Web  Dev "), "web dev");
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::defaults;
use crate::normalizer::Normalizer;
use crate::{Error, Result};

/// Normalization and delimiter settings shared by every tagging operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    /// Strategy that derives the normalized key from a display name.
    pub normalizer: Normalizer,
    /// Characters that split delimited input; the first one joins output lists.
    pub delimiters: String,
    /// Maximum display name length, in characters.
    pub max_tag_length: usize,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            normalizer: Normalizer::default(),
            delimiters: defaults::DELIMITERS.to_string(),
            max_tag_length: defaults::MAX_TAG_LENGTH,
        }
    }
}

impl TaggingConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from `TAGGABLE_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(name) = lookup(defaults::ENV_NORMALIZER) {
            config.normalizer = name.parse()?;
        }
        if let Some(delimiters) = lookup(defaults::ENV_DELIMITERS) {
            config.delimiters = delimiters;
        }
        if let Some(max) = lookup(defaults::ENV_MAX_TAG_LENGTH) {
            config.max_tag_length = max.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a positive integer, got '{}'",
                    defaults::ENV_MAX_TAG_LENGTH,
                    max
                ))
            })?;
        }

        config.validate()?;

        debug!(
            subsystem = "config",
            normalizer = %config.normalizer,
            delimiters = %config.delimiters,
            max_tag_length = config.max_tag_length,
            "Loaded tagging configuration"
        );
        Ok(config)
    }

    /// Replace the normalization strategy.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replace the delimiter set.
    pub fn with_delimiters(mut self, delimiters: impl Into<String>) -> Result<Self> {
        self.delimiters = delimiters.into();
        self.validate()?;
        Ok(self)
    }

    /// Replace the maximum display name length.
    pub fn with_max_tag_length(mut self, max: usize) -> Result<Self> {
        self.max_tag_length = max;
        self.validate()?;
        Ok(self)
    }

    /// Check the configuration for values no operation could work with.
    pub fn validate(&self) -> Result<()> {
        if self.delimiters.is_empty() {
            return Err(Error::Config(
                "At least one delimiter character is required".to_string(),
            ));
        }
        if self.max_tag_length == 0 {
            return Err(Error::Config(
                "max_tag_length must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Normalize a raw tag name with the configured strategy.
    ///
    /// The name is trimmed first, so stored keys and lookup keys agree even
    /// when a custom normalizer keeps surrounding whitespace.
    pub fn normalize(&self, raw: &str) -> String {
        self.normalizer.normalize(raw.trim())
    }

    /// Character used to join tag lists: the first configured delimiter.
    pub fn glue(&self) -> char {
        self.delimiters
            .chars()
            .next()
            .unwrap_or_else(|| defaults::DELIMITERS.chars().next().unwrap_or(','))
    }

    /// Whether `c` is one of the configured delimiters.
    pub fn is_delimiter(&self, c: char) -> bool {
        self.delimiters.contains(c)
    }

    /// Split delimited input into trimmed, non-blank tokens.
    ///
    /// Runs of delimiters collapse, so `"a,,b"` yields `["a", "b"]`.
    pub fn split(&self, input: &str) -> Vec<String> {
        input
            .split(|c| self.is_delimiter(c))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect()
    }
}
