//! Tag membership filters.

use serde::{Deserialize, Serialize};

use crate::config::TaggingConfig;
use crate::tags::TagInput;

/// Tag membership condition over the entities of one taggable type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", content = "tags", rename_all = "snake_case")]
pub enum TagFilter {
    /// Entity must carry every listed tag.
    All(TagInput),
    /// Entity must carry at least one listed tag; with no tags listed, at least
    /// one tag of any kind.
    Any(TagInput),
}

impl TagFilter {
    pub fn all(input: impl Into<TagInput>) -> Self {
        TagFilter::All(input.into())
    }

    pub fn any(input: impl Into<TagInput>) -> Self {
        TagFilter::Any(input.into())
    }

    /// Distinct normalized keys the filter matches against.
    pub fn normalized(&self, config: &TaggingConfig) -> Vec<String> {
        match self {
            TagFilter::All(input) | TagFilter::Any(input) => input.normalized(config),
        }
    }
}
