//! Tag model types.
//!
//! A [`Tag`] is a shared, uniquely-normalized label. [`TagName`] is the only way
//! to produce the `(name, normalized)` pair that gets persisted, so every write
//! path applies the same trimming, validation, and normalization.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::config::TaggingConfig;
use crate::{Error, Result};

// =============================================================================
// TAG
// =============================================================================

/// A persisted tag row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    /// Trimmed display name, as first seen.
    pub name: String,
    /// Normalized lookup key; unique across all tags.
    pub normalized: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    /// Read the requested field.
    pub fn field(&self, field: TagField) -> &str {
        match field {
            TagField::Name => &self.name,
            TagField::Normalized => &self.normalized,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A tag together with the number of taggables currently using it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUsage {
    #[serde(flatten)]
    pub tag: Tag,
    /// Number of associations pointing at this tag (computed)
    #[serde(default)]
    pub usage_count: i64,
}

/// Which representation of a tag to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagField {
    /// The display name.
    Name,
    /// The normalized key.
    Normalized,
}

// =============================================================================
// TAG NAME
// =============================================================================

/// A validated display name and its normalized key, computed together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagName {
    name: String,
    normalized: String,
}

impl TagName {
    /// Trim `raw`, validate it, and derive the normalized key.
    ///
    /// Rejects names that are blank after trimming, longer than
    /// `config.max_tag_length` characters, that contain a configured delimiter
    /// (they could not survive a list round-trip), or whose normalized form is
    /// empty.
    pub fn new(raw: &str, config: &TaggingConfig) -> Result<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Tag name cannot be blank".to_string(),
            ));
        }

        let len = name.chars().count();
        if len > config.max_tag_length {
            return Err(Error::InvalidInput(format!(
                "Tag name must be {} characters or less, got {}",
                config.max_tag_length, len
            )));
        }

        if let Some(c) = name.chars().find(|c| config.is_delimiter(*c)) {
            return Err(Error::InvalidInput(format!(
                "Tag name '{}' contains the delimiter '{}'",
                name, c
            )));
        }

        let normalized = config.normalize(name);
        if normalized.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Tag name '{}' normalizes to an empty key",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            normalized,
        })
    }

    /// The trimmed display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The normalized key.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// =============================================================================
// TAG INPUT
// =============================================================================

/// Tag input accepted by the tagging operations: an explicit list, or a single
/// string split on the configured delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagInput {
    List(Vec<String>),
    Delimited(String),
}

impl TagInput {
    /// Expand into candidate names.
    ///
    /// Delimited input is split, trimmed, and stripped of blank tokens. List
    /// entries are passed through untouched so that blank entries still reach
    /// validation.
    pub fn candidates(&self, config: &TaggingConfig) -> Vec<String> {
        match self {
            TagInput::List(names) => names.clone(),
            TagInput::Delimited(s) => config.split(s),
        }
    }

    /// Validate every candidate, dropping those that normalize to a key
    /// already seen. First occurrence wins.
    pub fn tag_names(&self, config: &TaggingConfig) -> Result<Vec<TagName>> {
        let mut names: Vec<TagName> = Vec::new();
        for candidate in self.candidates(config) {
            let name = TagName::new(&candidate, config)?;
            if !names.iter().any(|n| n.normalized == name.normalized) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Distinct normalized keys of the non-blank candidates, in input order.
    ///
    /// Used by lookups, which never fail on input they cannot match.
    pub fn normalized(&self, config: &TaggingConfig) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for candidate in self.candidates(config) {
            let key = config.normalize(&candidate);
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Whether the input holds no candidates at all.
    pub fn is_empty(&self, config: &TaggingConfig) -> bool {
        self.candidates(config).is_empty()
    }
}

impl Default for TagInput {
    fn default() -> Self {
        TagInput::List(Vec::new())
    }
}

impl From<&str> for TagInput {
    fn from(s: &str) -> Self {
        TagInput::Delimited(s.to_string())
    }
}

impl From<String> for TagInput {
    fn from(s: String) -> Self {
        TagInput::Delimited(s)
    }
}

impl From<&String> for TagInput {
    fn from(s: &String) -> Self {
        TagInput::Delimited(s.clone())
    }
}

impl From<Vec<String>> for TagInput {
    fn from(v: Vec<String>) -> Self {
        TagInput::List(v)
    }
}

impl From<Vec<&str>> for TagInput {
    fn from(v: Vec<&str>) -> Self {
        TagInput::List(v.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for TagInput {
    fn from(v: &[&str]) -> Self {
        TagInput::List(v.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TagInput {
    fn from(v: [&str; N]) -> Self {
        TagInput::List(v.iter().map(|s| s.to_string()).collect())
    }
}

// =============================================================================
// RENDERING
// =============================================================================

/// Ordered mapping from tag id to a rendered tag field.
///
/// Iteration follows the order the tags were supplied in (association
/// insertion order for instance reads). Serializes as a JSON object whose keys
/// keep that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagArray {
    entries: Vec<(i64, String)>,
}

impl TagArray {
    /// Render `field` of each tag, keyed by tag id.
    pub fn from_tags(tags: &[Tag], field: TagField) -> Self {
        Self {
            entries: tags
                .iter()
                .map(|t| (t.id, t.field(field).to_string()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the rendered value for a tag id.
    pub fn get(&self, tag_id: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| *id == tag_id)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn values(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> + '_ {
        self.entries.iter().map(|(id, v)| (*id, v.as_str()))
    }

    /// Rendered values in order, without the keys.
    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Join the values with `glue`.
    pub fn join(&self, glue: char) -> String {
        let mut out = String::new();
        for (i, value) in self.values().enumerate() {
            if i > 0 {
                out.push(glue);
            }
            out.push_str(value);
        }
        out
    }
}

impl IntoIterator for TagArray {
    type Item = (i64, String);
    type IntoIter = std::vec::IntoIter<(i64, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for TagArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, value) in &self.entries {
            map.serialize_entry(&id.to_string(), value)?;
        }
        map.end()
    }
}

/// Join `field` of each tag with the configured glue character.
pub fn tag_list(tags: &[Tag], field: TagField, config: &TaggingConfig) -> String {
    TagArray::from_tags(tags, field).join(config.glue())
}
