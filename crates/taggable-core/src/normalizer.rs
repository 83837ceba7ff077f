//! Tag name normalization strategies.
//!
//! A normalizer folds a raw tag name into the key used for uniqueness and
//! lookup. Two names with the same normalized form are the same tag.
//!
//! Every built-in strategy is deterministic and idempotent:
//! `normalize(normalize(x)) == normalize(x)`. Custom strategies must uphold the
//! same contract, otherwise lookups by an already-normalized name would miss.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// Signature of a custom normalization function.
pub type NormalizeFn = dyn Fn(&str) -> String + Send + Sync;

/// Normalization strategy applied to every tag name on write and lookup.
#[derive(Clone, Default)]
pub enum Normalizer {
    /// Trim surrounding whitespace and lowercase.
    #[default]
    Lowercase,
    /// Trim surrounding whitespace only; lookups stay case-sensitive.
    Trim,
    /// Lowercase and collapse every whitespace run into a single space.
    CollapseWhitespace,
    /// Caller-supplied strategy.
    Custom {
        name: String,
        func: Arc<NormalizeFn>,
    },
}

impl Normalizer {
    /// Wrap a closure as a named custom strategy.
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Normalizer::Custom {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Fold `raw` into its normalized form.
    pub fn normalize(&self, raw: &str) -> String {
        match self {
            Normalizer::Lowercase => raw.trim().to_lowercase(),
            Normalizer::Trim => raw.trim().to_string(),
            Normalizer::CollapseWhitespace => raw
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
            Normalizer::Custom { func, .. } => func(raw),
        }
    }

    /// Stable strategy name, as accepted by [`FromStr`].
    pub fn name(&self) -> &str {
        match self {
            Normalizer::Lowercase => "lowercase",
            Normalizer::Trim => "trim",
            Normalizer::CollapseWhitespace => "collapse_whitespace",
            Normalizer::Custom { name, .. } => name,
        }
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Normalizer::Custom { name, .. } => f.debug_tuple("Custom").field(name).finish(),
            other => f.write_str(other.name()),
        }
    }
}

impl fmt::Display for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Normalizer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lowercase" | "lower" => Ok(Normalizer::Lowercase),
            "trim" | "exact" => Ok(Normalizer::Trim),
            "collapse_whitespace" | "collapse-whitespace" => Ok(Normalizer::CollapseWhitespace),
            _ => Err(Error::Config(format!(
                "Unknown normalizer '{}'. Expected one of: lowercase, trim, collapse_whitespace",
                s
            ))),
        }
    }
}

impl Serialize for Normalizer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Normalizer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
