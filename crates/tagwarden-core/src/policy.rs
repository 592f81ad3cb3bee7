//! Governance policy inputs
//!
//! [`RequiredTagPolicy`] lists the keys every resource must carry, in the
//! order findings are reported. [`DefaultTagMapping`] holds the operator's
//! fallback values used to fill gaps.

use crate::error::GovernanceError;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Keys required when no policy is configured
pub const DEFAULT_REQUIRED_TAGS: [&str; 3] = ["Owner", "Environment", "CostCenter"];

/// Ordered set of mandatory tag keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct RequiredTagPolicy {
    keys: IndexSet<String>,
}

impl RequiredTagPolicy {
    /// Create policy from keys; duplicates collapse onto their first position
    ///
    /// # Errors
    /// Returns a configuration error if no key is given or a key is blank.
    pub fn new<I, S>(keys: I) -> Result<Self, GovernanceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: IndexSet<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(GovernanceError::config("required tag policy is empty"));
        }
        if keys.iter().any(|k| k.trim().is_empty()) {
            return Err(GovernanceError::config("required tag keys must not be blank"));
        }
        Ok(Self { keys })
    }

    /// Iterate keys in policy order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Number of required keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false for a constructed policy
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for RequiredTagPolicy {
    fn default() -> Self {
        Self {
            keys: DEFAULT_REQUIRED_TAGS.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for RequiredTagPolicy {
    type Error = GovernanceError;

    fn try_from(keys: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(keys)
    }
}

impl From<RequiredTagPolicy> for Vec<String> {
    fn from(policy: RequiredTagPolicy) -> Self {
        policy.keys.into_iter().collect()
    }
}

/// Operator-supplied fallback values for missing keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefaultTagMapping(IndexMap<String, String>);

impl DefaultTagMapping {
    /// Create empty mapping
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse repeated `KEY=VALUE` arguments
    ///
    /// The value may itself contain `=`; only the first one splits.
    ///
    /// # Errors
    /// Returns a configuration error for an entry without `=` or with an
    /// empty key.
    pub fn parse_pairs<I, S>(pairs: I) -> Result<Self, GovernanceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mapping = Self::new();
        for pair in pairs {
            let entry: DefaultTag = pair.as_ref().parse()?;
            mapping.insert(entry.key, entry.value);
        }
        Ok(mapping)
    }

    /// Insert a fallback value
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder form of [`DefaultTagMapping::insert`]
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a fallback value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Check if no defaults were supplied
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Overlay `other` on top of `self`; `other` wins
    #[must_use]
    pub fn overlaid_with(mut self, other: &DefaultTagMapping) -> Self {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }
}

/// One `KEY=VALUE` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultTag {
    /// Tag key
    pub key: String,
    /// Fallback value
    pub value: String,
}

impl FromStr for DefaultTag {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| GovernanceError::config(format!("expected KEY=VALUE, got `{s}`")))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(GovernanceError::config(format!("empty tag key in `{s}`")));
        }
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}
