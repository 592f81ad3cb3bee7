//! Remediation planning
//!
//! Turns missing keys into concrete tags using the operator's defaults.
//! Keys without a configured default are left out of the plan, so the
//! resource stays non-compliant until someone supplies a value.

use crate::policy::DefaultTagMapping;
use crate::resource::{ResourceId, ResourceKind};
use crate::tags::TagSet;

/// Concrete tags to apply to one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationPlan {
    /// Target resource
    pub resource_id: ResourceId,
    /// Resource type
    pub kind: ResourceKind,
    /// Tags to write
    pub tags: TagSet,
}

impl RemediationPlan {
    /// Check if the plan writes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Tags for the missing keys that have a configured default
#[must_use]
pub fn remediation_tags(missing: &[String], defaults: &DefaultTagMapping) -> TagSet {
    missing
        .iter()
        .filter_map(|key| defaults.get(key).map(|value| (key.as_str(), value)))
        .collect()
}

/// Build the plan for one resource
#[must_use]
pub fn plan(
    kind: ResourceKind,
    resource_id: &ResourceId,
    missing: &[String],
    defaults: &DefaultTagMapping,
) -> RemediationPlan {
    RemediationPlan {
        resource_id: resource_id.clone(),
        kind,
        tags: remediation_tags(missing, defaults),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| (*k).to_string()).collect()
    }

    #[test]
    fn keys_without_defaults_are_skipped() {
        let defaults = DefaultTagMapping::new().with("Environment", "prod");
        let tags = remediation_tags(&missing(&["Environment", "CostCenter"]), &defaults);
        assert_eq!(tags, TagSet::new().with("Environment", "prod"));
    }

    #[test]
    fn no_matching_default_gives_empty_plan() {
        let defaults = DefaultTagMapping::new().with("Owner", "ops");
        let plan = plan(
            ResourceKind::ObjectBucket,
            &ResourceId::from("logs"),
            &missing(&["CostCenter"]),
            &defaults,
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn defaults_for_present_keys_are_ignored() {
        let defaults = DefaultTagMapping::new()
            .with("Owner", "ops")
            .with("Environment", "prod");
        let tags = remediation_tags(&missing(&["Environment"]), &defaults);
        assert!(!tags.contains_key("Owner"));
        assert_eq!(tags.len(), 1);
    }
}
