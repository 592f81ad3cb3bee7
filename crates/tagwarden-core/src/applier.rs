//! Tag application
//!
//! Writes a [`RemediationPlan`] through the resource's own write strategy.
//! The applier never inspects the resource type; additive versus
//! read-merge-overwrite is decided by the [`Resource`] implementation.

use crate::error::RemediationError;
use crate::gateway::ResourceGateway;
use crate::remediation::RemediationPlan;
use crate::resource::Resource;

/// Result of applying a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The gateway accepted the write
    Applied,
    /// The plan was empty; no call was made
    NothingToApply,
}

/// Applies remediation plans against a gateway
#[derive(Debug)]
pub struct TagApplier<'g, G: ?Sized> {
    gateway: &'g G,
}

impl<'g, G> TagApplier<'g, G>
where
    G: ResourceGateway,
{
    /// Create applier writing through `gateway`
    #[inline]
    #[must_use]
    pub fn new(gateway: &'g G) -> Self {
        Self { gateway }
    }

    /// Apply `plan` to `resource`
    ///
    /// # Errors
    /// Returns [`RemediationError`] when the gateway rejects the write or,
    /// for overwrite resources, when the current tags cannot be read.
    pub async fn apply<R: Resource>(
        &self,
        resource: &R,
        plan: &RemediationPlan,
    ) -> Result<ApplyOutcome, RemediationError> {
        if plan.is_empty() {
            return Ok(ApplyOutcome::NothingToApply);
        }

        resource
            .write_tags(self.gateway, &plan.tags)
            .await
            .map_err(|source| {
                RemediationError::new(R::KIND, resource.id().clone(), "apply-tags", source)
            })?;

        tracing::info!(
            resource_type = %R::KIND,
            resource_id = %resource.id(),
            write_mode = ?R::KIND.write_mode(),
            tags = %plan.tags,
            "{} {} tagged with {}",
            R::KIND,
            resource.id(),
            plan.tags
        );
        Ok(ApplyOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::gateway::{BucketEntry, InMemoryGateway, InstanceEntry, Inventory};
    use crate::resource::{ComputeInstance, ObjectBucket, ResourceId, ResourceKind};
    use crate::tags::{RawTag, TagSet};

    fn gateway() -> InMemoryGateway {
        InMemoryGateway::new(Inventory {
            instances: vec![InstanceEntry {
                id: "i-1".into(),
                state: Default::default(),
                tags: vec![RawTag::new("Owner", "x")],
                volumes: vec![],
            }],
            buckets: vec![
                BucketEntry {
                    name: "tagged".into(),
                    tags: Some(vec![RawTag::new("Project", "a")]),
                },
                BucketEntry {
                    name: "bare".into(),
                    tags: None,
                },
            ],
            ..Inventory::default()
        })
    }

    fn plan(kind: ResourceKind, id: &str, tags: TagSet) -> RemediationPlan {
        RemediationPlan {
            resource_id: ResourceId::from(id),
            kind,
            tags,
        }
    }

    #[tokio::test]
    async fn empty_plan_makes_no_calls() {
        let gateway = gateway();
        let bucket = ObjectBucket {
            name: ResourceId::from("tagged"),
        };
        let outcome = TagApplier::new(&gateway)
            .apply(&bucket, &plan(ResourceKind::ObjectBucket, "tagged", TagSet::new()))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::NothingToApply);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn instance_write_sends_only_plan_tags() {
        let gateway = gateway();
        let instance = ComputeInstance {
            id: ResourceId::from("i-1"),
            tags: TagSet::new().with("Owner", "x"),
        };
        let tags = TagSet::new().with("Environment", "prod");
        TagApplier::new(&gateway)
            .apply(&instance, &plan(ResourceKind::ComputeInstance, "i-1", tags.clone()))
            .await
            .unwrap();

        assert_eq!(
            gateway.calls(),
            vec![crate::gateway::GatewayCall::CreateTags {
                resource_id: ResourceId::from("i-1"),
                tags,
            }]
        );
        let after = gateway.instance_tags("i-1").unwrap();
        assert_eq!(after.get("Owner"), Some("x"));
        assert_eq!(after.get("Environment"), Some("prod"));
    }

    #[tokio::test]
    async fn bucket_write_preserves_existing_tags() {
        let gateway = gateway();
        let bucket = ObjectBucket {
            name: ResourceId::from("tagged"),
        };
        TagApplier::new(&gateway)
            .apply(
                &bucket,
                &plan(ResourceKind::ObjectBucket, "tagged", TagSet::new().with("Owner", "bob")),
            )
            .await
            .unwrap();

        assert_eq!(
            gateway.bucket_tags("tagged").unwrap(),
            TagSet::new().with("Project", "a").with("Owner", "bob")
        );
    }

    #[tokio::test]
    async fn bucket_plan_value_wins_and_reapply_is_stable() {
        let gateway = InMemoryGateway::new(Inventory {
            buckets: vec![BucketEntry {
                name: "shared".into(),
                tags: Some(vec![RawTag::new("Owner", "alice"), RawTag::new("Project", "a")]),
            }],
            ..Inventory::default()
        });
        let bucket = ObjectBucket {
            name: ResourceId::from("shared"),
        };
        let plan = plan(ResourceKind::ObjectBucket, "shared", TagSet::new().with("Owner", "bob"));
        let applier = TagApplier::new(&gateway);
        let expected = TagSet::new().with("Owner", "bob").with("Project", "a");

        applier.apply(&bucket, &plan).await.unwrap();
        let once = gateway.bucket_tags("shared").unwrap();
        assert_eq!(once, expected);

        applier.apply(&bucket, &plan).await.unwrap();
        assert_eq!(gateway.bucket_tags("shared").unwrap(), once);
    }

    #[tokio::test]
    async fn untagged_bucket_is_written_from_empty() {
        let gateway = gateway();
        let bucket = ObjectBucket {
            name: ResourceId::from("bare"),
        };
        TagApplier::new(&gateway)
            .apply(
                &bucket,
                &plan(ResourceKind::ObjectBucket, "bare", TagSet::new().with("Owner", "bob")),
            )
            .await
            .unwrap();
        assert_eq!(gateway.bucket_tags("bare").unwrap(), TagSet::new().with("Owner", "bob"));
    }

    #[tokio::test]
    async fn failed_bucket_read_blocks_overwrite() {
        let gateway = gateway()
            .with_failing_reads("tagged", GatewayError::AccessDenied("tagged".into()));
        let bucket = ObjectBucket {
            name: ResourceId::from("tagged"),
        };
        let err = TagApplier::new(&gateway)
            .apply(
                &bucket,
                &plan(ResourceKind::ObjectBucket, "tagged", TagSet::new().with("Owner", "bob")),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ResourceKind::ObjectBucket);
        assert_eq!(err.resource_id.as_str(), "tagged");
        assert!(gateway.mutations().is_empty());
        assert_eq!(gateway.bucket_tags("tagged").unwrap(), TagSet::new().with("Project", "a"));
    }

    #[tokio::test]
    async fn rejected_write_is_remediation_error() {
        let gateway =
            gateway().with_failing_writes("i-1", GatewayError::Throttled("i-1".into()));
        let instance = ComputeInstance {
            id: ResourceId::from("i-1"),
            tags: TagSet::new(),
        };
        let err = TagApplier::new(&gateway)
            .apply(
                &instance,
                &plan(ResourceKind::ComputeInstance, "i-1", TagSet::new().with("Owner", "y")),
            )
            .await
            .unwrap_err();
        assert_eq!(err.source, GatewayError::Throttled("i-1".into()));
    }
}
