//! Tag audit driver
//!
//! Walks one resource type in listing order and, for each resource:
//! read tags -> evaluate -> plan -> apply. Each resource is finished before
//! the next is started. A failure on one resource is recorded in the report
//! and the walk continues; only a failed listing aborts the walk.

use crate::applier::{ApplyOutcome, TagApplier};
use crate::compliance;
use crate::error::{GatewayError, RemediationError};
use crate::gateway::ResourceGateway;
use crate::policy::{DefaultTagMapping, RequiredTagPolicy};
use crate::remediation;
use crate::resource::{Resource, ResourceId, ResourceKind};
use crate::tags::TagSet;

/// Audit settings, fixed for a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditSettings {
    /// Keys every resource must carry
    pub policy: RequiredTagPolicy,
    /// Fallback values for missing keys
    pub defaults: DefaultTagMapping,
    /// Evaluate and plan but never write
    pub dry_run: bool,
}

/// What happened to a resource after evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    /// Nothing was missing
    Compliant,
    /// No defaults were supplied for this run
    NotRequested,
    /// None of the missing keys has a default
    NoDefaults,
    /// Dry run; these tags would have been written
    DryRun(TagSet),
    /// These tags were written
    Applied(TagSet),
    /// The write failed
    Failed(RemediationError),
}

/// Audit result for one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFinding {
    /// Resource type
    pub kind: ResourceKind,
    /// Resource identifier
    pub resource_id: ResourceId,
    /// Tags observed before remediation
    pub tags: TagSet,
    /// Required keys that were absent, in policy order
    pub missing: Vec<String>,
    /// Remediation result
    pub outcome: RemediationOutcome,
}

impl ResourceFinding {
    /// Check if the resource was compliant when observed
    #[inline]
    #[must_use]
    pub fn was_compliant(&self) -> bool {
        self.missing.is_empty()
    }

    /// Tags the resource carries after this run
    #[must_use]
    pub fn effective_tags(&self) -> TagSet {
        match &self.outcome {
            RemediationOutcome::Applied(applied) => self.tags.merged_with(applied),
            _ => self.tags.clone(),
        }
    }

    /// Required keys still absent after this run
    #[must_use]
    pub fn still_missing(&self) -> Vec<String> {
        match &self.outcome {
            RemediationOutcome::Applied(applied) => self
                .missing
                .iter()
                .filter(|key| !applied.contains_key(key))
                .cloned()
                .collect(),
            _ => self.missing.clone(),
        }
    }
}

/// A resource whose tags could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableResource {
    /// Resource identifier
    pub resource_id: ResourceId,
    /// Read failure
    pub error: GatewayError,
}

/// Audit results for one resource type, in listing order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    /// Resource type audited
    pub kind: ResourceKind,
    /// Evaluated resources
    pub findings: Vec<ResourceFinding>,
    /// Resources skipped because their tags could not be read
    pub unreadable: Vec<UnreadableResource>,
}

impl AuditReport {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            findings: Vec::new(),
            unreadable: Vec::new(),
        }
    }

    /// Aggregate counts
    #[must_use]
    pub fn summary(&self) -> AuditSummary {
        let mut summary = AuditSummary {
            unreadable: self.unreadable.len(),
            ..AuditSummary::default()
        };
        for finding in &self.findings {
            if finding.was_compliant() {
                summary.compliant += 1;
            } else {
                summary.non_compliant += 1;
            }
            match finding.outcome {
                RemediationOutcome::Applied(_) => summary.remediated += 1,
                RemediationOutcome::Failed(_) => summary.failed += 1,
                _ => {}
            }
        }
        summary
    }
}

/// Counts over an [`AuditReport`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    /// Compliant when observed
    pub compliant: usize,
    /// Missing at least one key when observed
    pub non_compliant: usize,
    /// Remediation written
    pub remediated: usize,
    /// Remediation write failed
    pub failed: usize,
    /// Tags could not be read
    pub unreadable: usize,
}

/// Runs tag audits against a gateway
#[derive(Debug)]
pub struct TagAuditor<'a, G> {
    gateway: &'a G,
    settings: &'a AuditSettings,
}

impl<'a, G> TagAuditor<'a, G>
where
    G: ResourceGateway,
{
    /// Create auditor
    #[inline]
    #[must_use]
    pub fn new(gateway: &'a G, settings: &'a AuditSettings) -> Self {
        Self { gateway, settings }
    }

    /// Audit every resource of type `R`
    ///
    /// # Errors
    /// Returns the gateway error if the listing fails.
    pub async fn audit<R: Resource>(&self) -> Result<AuditReport, GatewayError> {
        let resources = R::list(self.gateway).await.map_err(|e| {
            tracing::error!(resource_type = %R::KIND, error = %e, "{} API error: {e}", R::KIND);
            e
        })?;

        let mut report = AuditReport::new(R::KIND);
        for resource in &resources {
            match resource.read_tags(self.gateway).await {
                Ok(tags) => report.findings.push(self.audit_one(resource, tags).await),
                Err(error) => {
                    tracing::error!(
                        resource_type = %R::KIND,
                        resource_id = %resource.id(),
                        error = %error,
                        "{} {}: could not read tags: {error}",
                        R::KIND,
                        resource.id()
                    );
                    report.unreadable.push(UnreadableResource {
                        resource_id: resource.id().clone(),
                        error,
                    });
                }
            }
        }

        let summary = report.summary();
        tracing::info!(
            resource_type = %R::KIND,
            compliant = summary.compliant,
            non_compliant = summary.non_compliant,
            remediated = summary.remediated,
            failed = summary.failed,
            unreadable = summary.unreadable,
            "{} audit finished",
            R::KIND
        );
        Ok(report)
    }

    async fn audit_one<R: Resource>(&self, resource: &R, tags: TagSet) -> ResourceFinding {
        let id = resource.id();
        let result = compliance::evaluate(R::KIND, id, Some(&tags), &self.settings.policy);
        let outcome = if result.is_compliant() {
            tracing::info!(resource_type = %R::KIND, resource_id = %id, "{} {id} is compliant", R::KIND);
            RemediationOutcome::Compliant
        } else {
            tracing::warn!(
                resource_type = %R::KIND,
                resource_id = %id,
                missing = ?result.missing,
                "{} {id} is missing tags: {}",
                R::KIND,
                result.missing.join(", ")
            );
            self.remediate(resource, &result.missing).await
        };

        ResourceFinding {
            kind: R::KIND,
            resource_id: id.clone(),
            tags,
            missing: result.missing,
            outcome,
        }
    }

    async fn remediate<R: Resource>(&self, resource: &R, missing: &[String]) -> RemediationOutcome {
        if self.settings.defaults.is_empty() {
            return RemediationOutcome::NotRequested;
        }

        let plan = remediation::plan(R::KIND, resource.id(), missing, &self.settings.defaults);
        if plan.is_empty() {
            tracing::info!(
                resource_type = %R::KIND,
                resource_id = %resource.id(),
                "{} {}: no defaults configured for missing tags",
                R::KIND,
                resource.id()
            );
            return RemediationOutcome::NoDefaults;
        }

        if self.settings.dry_run {
            tracing::info!(
                resource_type = %R::KIND,
                resource_id = %resource.id(),
                "[DRY-RUN] {} {} would be tagged with {}",
                R::KIND,
                resource.id(),
                plan.tags
            );
            return RemediationOutcome::DryRun(plan.tags);
        }

        match TagApplier::new(self.gateway).apply(resource, &plan).await {
            Ok(ApplyOutcome::Applied) => RemediationOutcome::Applied(plan.tags),
            Ok(ApplyOutcome::NothingToApply) => RemediationOutcome::NoDefaults,
            Err(error) => {
                tracing::error!(
                    resource_type = %R::KIND,
                    resource_id = %resource.id(),
                    error = %error,
                    "{error}"
                );
                RemediationOutcome::Failed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(missing: &[&str], outcome: RemediationOutcome) -> ResourceFinding {
        ResourceFinding {
            kind: ResourceKind::ComputeInstance,
            resource_id: ResourceId::from("i-1"),
            tags: TagSet::new().with("Owner", "x"),
            missing: missing.iter().map(|k| (*k).to_string()).collect(),
            outcome,
        }
    }

    #[test]
    fn still_missing_after_partial_remediation() {
        let f = finding(
            &["Environment", "CostCenter"],
            RemediationOutcome::Applied(TagSet::new().with("Environment", "prod")),
        );
        assert_eq!(f.still_missing(), vec!["CostCenter"]);
        assert_eq!(f.effective_tags().get("Environment"), Some("prod"));
    }

    #[test]
    fn dry_run_changes_nothing_effective() {
        let f = finding(
            &["Environment"],
            RemediationOutcome::DryRun(TagSet::new().with("Environment", "prod")),
        );
        assert_eq!(f.still_missing(), vec!["Environment"]);
        assert!(!f.effective_tags().contains_key("Environment"));
    }

    #[test]
    fn summary_counts() {
        let report = AuditReport {
            kind: ResourceKind::ComputeInstance,
            findings: vec![
                finding(&[], RemediationOutcome::Compliant),
                finding(&["Environment"], RemediationOutcome::NotRequested),
                finding(
                    &["Environment"],
                    RemediationOutcome::Applied(TagSet::new().with("Environment", "prod")),
                ),
            ],
            unreadable: vec![UnreadableResource {
                resource_id: ResourceId::from("i-9"),
                error: GatewayError::AccessDenied("i-9".into()),
            }],
        };
        assert_eq!(
            report.summary(),
            AuditSummary {
                compliant: 1,
                non_compliant: 2,
                remediated: 1,
                failed: 0,
                unreadable: 1,
            }
        );
    }
}
