//! Taggable cloud resources
//!
//! Each resource type knows how to list itself, read its current tags and
//! write new ones. The two implementations differ only in their tag-write
//! strategy:
//! - [`ComputeInstance`]: additive; the provider merges new tags in
//! - [`ObjectBucket`]: overwrite; the provider replaces the whole set, so
//!   the current set is read and merged before writing

use crate::error::GatewayError;
use crate::gateway::{InstanceFilter, ResourceGateway};
use crate::tags::TagSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-assigned resource identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Block storage volume identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeId(String);

impl VolumeId {
    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VolumeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot identifier, assigned by the provider on creation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SnapshotId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SnapshotId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Compute instance (additive tagging)
    ComputeInstance,
    /// Object storage bucket (overwrite tagging)
    ObjectBucket,
}

impl ResourceKind {
    /// Short label used in logs and reports
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ComputeInstance => "EC2",
            Self::ObjectBucket => "S3",
        }
    }

    /// How the provider applies a tag write for this type
    #[inline]
    #[must_use]
    pub fn write_mode(self) -> TagWriteMode {
        match self {
            Self::ComputeInstance => TagWriteMode::Additive,
            Self::ObjectBucket => TagWriteMode::Overwrite,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Provider semantics of a tag write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagWriteMode {
    /// New tags are merged with existing ones by the provider
    Additive,
    /// The written set replaces the existing one
    Overwrite,
}

/// A listable, taggable cloud resource
#[async_trait]
pub trait Resource: Send + Sync + Sized {
    /// Resource type
    const KIND: ResourceKind;

    /// Provider-assigned identifier
    fn id(&self) -> &ResourceId;

    /// List every resource of this type in provider order
    async fn list(gateway: &dyn ResourceGateway) -> Result<Vec<Self>, GatewayError>;

    /// Current tags; a resource without a tag set has an empty one
    async fn read_tags(&self, gateway: &dyn ResourceGateway) -> Result<TagSet, GatewayError>;

    /// Write `tags` so the resource ends up carrying at least them
    ///
    /// Existing tags not named in `tags` survive the write.
    async fn write_tags(
        &self,
        gateway: &dyn ResourceGateway,
        tags: &TagSet,
    ) -> Result<(), GatewayError>;
}

/// Compute instance with its listed tags and volumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeInstance {
    /// Instance id
    pub id: ResourceId,
    /// Tags reported by the listing
    pub tags: TagSet,
}

#[async_trait]
impl Resource for ComputeInstance {
    const KIND: ResourceKind = ResourceKind::ComputeInstance;

    fn id(&self) -> &ResourceId {
        &self.id
    }

    async fn list(gateway: &dyn ResourceGateway) -> Result<Vec<Self>, GatewayError> {
        let records = gateway.list_instances(InstanceFilter::All).await?;
        Ok(records
            .into_iter()
            .map(|record| Self {
                id: record.id,
                tags: record.tags,
            })
            .collect())
    }

    async fn read_tags(&self, _gateway: &dyn ResourceGateway) -> Result<TagSet, GatewayError> {
        Ok(self.tags.clone())
    }

    async fn write_tags(
        &self,
        gateway: &dyn ResourceGateway,
        tags: &TagSet,
    ) -> Result<(), GatewayError> {
        gateway.create_tags(&self.id, tags).await
    }
}

/// Object storage bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBucket {
    /// Bucket name
    pub name: ResourceId,
}

#[async_trait]
impl Resource for ObjectBucket {
    const KIND: ResourceKind = ResourceKind::ObjectBucket;

    fn id(&self) -> &ResourceId {
        &self.name
    }

    async fn list(gateway: &dyn ResourceGateway) -> Result<Vec<Self>, GatewayError> {
        let records = gateway.list_buckets().await?;
        Ok(records
            .into_iter()
            .map(|record| Self { name: record.name })
            .collect())
    }

    async fn read_tags(&self, gateway: &dyn ResourceGateway) -> Result<TagSet, GatewayError> {
        Ok(gateway.get_bucket_tags(&self.name).await?.into_tag_set())
    }

    async fn write_tags(
        &self,
        gateway: &dyn ResourceGateway,
        tags: &TagSet,
    ) -> Result<(), GatewayError> {
        // Read failures other than "no tag set" must stop the write, or the
        // put below would erase whatever tags the bucket carries.
        let current = self.read_tags(gateway).await?;
        let merged = current.merged_with(tags);
        gateway.put_bucket_tags(&self.name, &merged).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_and_modes() {
        assert_eq!(ResourceKind::ComputeInstance.to_string(), "EC2");
        assert_eq!(ResourceKind::ObjectBucket.to_string(), "S3");
        assert_eq!(ResourceKind::ComputeInstance.write_mode(), TagWriteMode::Additive);
        assert_eq!(ResourceKind::ObjectBucket.write_mode(), TagWriteMode::Overwrite);
        assert_eq!(<ObjectBucket as Resource>::KIND, ResourceKind::ObjectBucket);
    }

    #[test]
    fn ids_display_verbatim() {
        assert_eq!(ResourceId::from("i-0abc").to_string(), "i-0abc");
        assert_eq!(VolumeId::from("vol-1").as_str(), "vol-1");
        assert_eq!(SnapshotId::from(String::from("snap-1")).to_string(), "snap-1");
    }
}
