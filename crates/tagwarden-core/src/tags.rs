//! Typed tag sets
//!
//! Providers hand tags back as a list of `{"Key": .., "Value": ..}` pairs.
//! [`TagSet`] is the single conversion point from that wire shape into a
//! key-unique mapping.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tag in provider wire shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTag {
    /// Tag key
    #[serde(rename = "Key")]
    pub key: String,
    /// Tag value
    #[serde(rename = "Value")]
    pub value: String,
}

impl RawTag {
    /// Create new raw tag
    #[inline]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Key-unique mapping of tag keys to values
///
/// Equality ignores ordering. Building from a raw list with duplicate keys
/// keeps the last value seen for each key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(IndexMap<String, String>);

impl TagSet {
    /// Create empty tag set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a provider tag list (last write wins)
    pub fn from_raw<'a>(raw: impl IntoIterator<Item = &'a RawTag>) -> Self {
        raw.into_iter()
            .map(|tag| (tag.key.clone(), tag.value.clone()))
            .collect()
    }

    /// Insert a tag, returning the previous value for the key
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder form of [`TagSet::insert`]
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Check for a key
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of tags
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no tags are present
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(key, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Union with `other`; values from `other` win on key collision
    #[must_use]
    pub fn merged_with(&self, other: &TagSet) -> TagSet {
        let mut merged = self.clone();
        for (key, value) in other.iter() {
            merged.insert(key, value);
        }
        merged
    }

    /// Convert back to provider wire shape
    #[must_use]
    pub fn to_raw(&self) -> Vec<RawTag> {
        self.iter().map(|(k, v)| RawTag::new(k, v)).collect()
    }
}

impl FromIterator<(String, String)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_keys_keep_last_value() {
        let raw = vec![
            RawTag::new("Owner", "alice"),
            RawTag::new("Project", "a"),
            RawTag::new("Owner", "bob"),
        ];
        let set = TagSet::from_raw(&raw);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("Owner"), Some("bob"));
    }

    #[test]
    fn merge_prefers_incoming_values() {
        let current = TagSet::new().with("Owner", "alice").with("Project", "a");
        let incoming = TagSet::new().with("Owner", "bob");
        let merged = current.merged_with(&incoming);
        assert_eq!(merged.get("Owner"), Some("bob"));
        assert_eq!(merged.get("Project"), Some("a"));
    }

    #[test]
    fn equality_ignores_order() {
        let a = TagSet::new().with("A", "1").with("B", "2");
        let b = TagSet::new().with("B", "2").with("A", "1");
        assert_eq!(a, b);
    }

    #[test]
    fn wire_shape_serialization() {
        let raw: Vec<RawTag> =
            serde_json::from_str(r#"[{"Key":"Owner","Value":"x"}]"#).unwrap();
        assert_eq!(raw[0], RawTag::new("Owner", "x"));
        assert_eq!(TagSet::from_raw(&raw).to_string(), "{Owner=x}");
    }
}
