//! Compliance evaluation
//!
//! Pure check of a resource's tags against the [`RequiredTagPolicy`].

use crate::policy::RequiredTagPolicy;
use crate::resource::{ResourceId, ResourceKind};
use crate::tags::TagSet;
use serde::{Deserialize, Serialize};

/// Outcome of evaluating one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    /// Resource identifier
    pub resource_id: ResourceId,
    /// Resource type
    pub kind: ResourceKind,
    /// Required keys absent from the resource, in policy order
    pub missing: Vec<String>,
}

impl ComplianceResult {
    /// Check if nothing is missing
    #[inline]
    #[must_use]
    pub fn is_compliant(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Required keys absent from `tags`, in policy order
///
/// An absent tag set is evaluated as an empty one.
#[must_use]
pub fn missing_keys(tags: Option<&TagSet>, policy: &RequiredTagPolicy) -> Vec<String> {
    policy
        .keys()
        .filter(|key| !tags.is_some_and(|tags| tags.contains_key(key)))
        .map(str::to_string)
        .collect()
}

/// Evaluate a resource's tags against `policy`
#[must_use]
pub fn evaluate(
    kind: ResourceKind,
    resource_id: &ResourceId,
    tags: Option<&TagSet>,
    policy: &RequiredTagPolicy,
) -> ComplianceResult {
    ComplianceResult {
        resource_id: resource_id.clone(),
        kind,
        missing: missing_keys(tags, policy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RequiredTagPolicy {
        RequiredTagPolicy::default()
    }

    #[test]
    fn missing_keys_follow_policy_order() {
        let tags = TagSet::new().with("Owner", "x");
        let result = evaluate(
            ResourceKind::ComputeInstance,
            &ResourceId::from("i-1"),
            Some(&tags),
            &policy(),
        );
        assert_eq!(result.missing, vec!["Environment", "CostCenter"]);
        assert!(!result.is_compliant());
    }

    #[test]
    fn fully_tagged_resource_is_compliant() {
        let tags = TagSet::new()
            .with("CostCenter", "42")
            .with("Owner", "x")
            .with("Environment", "prod")
            .with("Extra", "ignored");
        assert!(missing_keys(Some(&tags), &policy()).is_empty());
    }

    #[test]
    fn absent_tag_set_misses_everything() {
        assert_eq!(missing_keys(None, &policy()).len(), 3);
        assert_eq!(missing_keys(Some(&TagSet::new()), &policy()).len(), 3);
    }

    #[test]
    fn key_match_is_case_sensitive() {
        let tags = TagSet::new().with("owner", "x");
        assert_eq!(missing_keys(Some(&tags), &policy())[0], "Owner");
    }
}
