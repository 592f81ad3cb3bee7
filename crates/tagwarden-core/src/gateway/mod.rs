//! Cloud gateway interfaces
//!
//! The provider surface is split by capability, the same way the rest of the
//! crate consumes it:
//! - [`InventoryApi`]: instance and bucket listings
//! - [`TaggingApi`]: tag reads and writes
//! - [`SnapshotApi`]: snapshot create/list/delete
//! - [`IdentityApi`]: user, MFA and access-key listings
//!
//! [`ResourceGateway`] is implemented for anything providing all four.

mod inventory;
pub mod memory;

pub use inventory::{
    AccessKeyEntry, BucketEntry, InstanceEntry, Inventory, SnapshotEntry, UserEntry,
};
pub use memory::{GatewayCall, InMemoryGateway, Listing};

use crate::error::GatewayError;
use crate::resource::{ResourceId, SnapshotId, VolumeId};
use crate::tags::TagSet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which instances a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceFilter {
    /// Every instance regardless of state
    #[default]
    All,
    /// Only instances in the running state
    Running,
}

impl InstanceFilter {
    /// Check whether an instance in `state` passes the filter
    #[inline]
    #[must_use]
    pub fn matches(self, state: InstanceState) -> bool {
        match self {
            Self::All => true,
            Self::Running => state == InstanceState::Running,
        }
    }
}

/// Compute instance lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    /// Booting
    Pending,
    /// Running
    #[default]
    Running,
    /// Shutting down
    Stopping,
    /// Stopped
    Stopped,
    /// Being terminated
    ShuttingDown,
    /// Gone
    Terminated,
}

/// Listed compute instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    /// Instance identifier
    pub id: ResourceId,
    /// Lifecycle state
    pub state: InstanceState,
    /// Tags reported with the listing
    pub tags: TagSet,
    /// Attached block storage volumes
    pub volumes: Vec<VolumeId>,
}

/// Listed object storage bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRecord {
    /// Bucket name
    pub name: ResourceId,
}

/// Result of reading a resource's tag set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagLookup {
    /// The resource has a tag set
    Found(TagSet),
    /// The resource has never been tagged
    Missing,
}

impl TagLookup {
    /// Collapse into a tag set; a missing set is empty
    #[inline]
    #[must_use]
    pub fn into_tag_set(self) -> TagSet {
        match self {
            Self::Found(tags) => tags,
            Self::Missing => TagSet::new(),
        }
    }
}

/// Request to snapshot one volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    /// Volume to copy
    pub volume_id: VolumeId,
    /// Human-readable description
    pub description: String,
    /// Tags applied at creation
    pub tags: TagSet,
}

/// Listed snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// Snapshot identifier
    pub id: SnapshotId,
    /// Source volume
    pub volume_id: VolumeId,
    /// Provider-reported start time
    pub created_at: DateTime<Utc>,
    /// Snapshot tags
    pub tags: TagSet,
}

/// Whose snapshots a listing returns
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OwnerScope {
    /// Snapshots owned by the calling account
    #[default]
    SelfAccount,
    /// Snapshots owned by a specific account id
    Account(String),
}

impl OwnerScope {
    /// Check whether a snapshot owned by `owner` is in scope
    #[must_use]
    pub fn includes(&self, owner: &str) -> bool {
        match self {
            Self::SelfAccount => owner == "self",
            Self::Account(account) => owner == account,
        }
    }
}

/// Listed identity user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// User name
    pub name: String,
    /// Last console login, if any
    pub password_last_used: Option<DateTime<Utc>>,
}

/// Registered MFA device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaDevice {
    /// Device serial number
    pub serial: String,
}

/// Access key metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKeyRecord {
    /// Access key id
    pub id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Instance and bucket listings
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// List compute instances in provider order
    async fn list_instances(&self, filter: InstanceFilter)
        -> Result<Vec<InstanceRecord>, GatewayError>;

    /// List object storage buckets in provider order
    async fn list_buckets(&self) -> Result<Vec<BucketRecord>, GatewayError>;
}

/// Tag reads and writes
#[async_trait]
pub trait TaggingApi: Send + Sync {
    /// Add tags to a resource, merging with what it already carries
    async fn create_tags(&self, resource_id: &ResourceId, tags: &TagSet)
        -> Result<(), GatewayError>;

    /// Read a bucket's full tag set
    async fn get_bucket_tags(&self, bucket: &ResourceId) -> Result<TagLookup, GatewayError>;

    /// Replace a bucket's entire tag set
    async fn put_bucket_tags(&self, bucket: &ResourceId, tags: &TagSet)
        -> Result<(), GatewayError>;
}

/// Snapshot management
#[async_trait]
pub trait SnapshotApi: Send + Sync {
    /// Start a snapshot and return its identifier
    async fn create_snapshot(&self, request: &SnapshotRequest)
        -> Result<SnapshotId, GatewayError>;

    /// List snapshots owned by `owner`
    async fn list_snapshots(&self, owner: &OwnerScope)
        -> Result<Vec<SnapshotRecord>, GatewayError>;

    /// Delete a snapshot
    async fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> Result<(), GatewayError>;
}

/// Identity listings
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// List every user in the account
    async fn list_users(&self) -> Result<Vec<UserRecord>, GatewayError>;

    /// List MFA devices for a user
    async fn list_mfa_devices(&self, user: &str) -> Result<Vec<MfaDevice>, GatewayError>;

    /// List access keys for a user
    async fn list_access_keys(&self, user: &str) -> Result<Vec<AccessKeyRecord>, GatewayError>;
}

/// Full provider surface
pub trait ResourceGateway: InventoryApi + TaggingApi + SnapshotApi + IdentityApi {}

impl<T> ResourceGateway for T where T: InventoryApi + TaggingApi + SnapshotApi + IdentityApi + ?Sized {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_filter() {
        assert!(InstanceFilter::Running.matches(InstanceState::Running));
        assert!(!InstanceFilter::Running.matches(InstanceState::Stopped));
        assert!(InstanceFilter::All.matches(InstanceState::Terminated));
    }

    #[test]
    fn missing_lookup_is_empty() {
        assert!(TagLookup::Missing.into_tag_set().is_empty());
        let found = TagLookup::Found(TagSet::new().with("Owner", "x"));
        assert_eq!(found.into_tag_set().get("Owner"), Some("x"));
    }

    #[test]
    fn owner_scope() {
        assert!(OwnerScope::SelfAccount.includes("self"));
        assert!(!OwnerScope::SelfAccount.includes("123456789012"));
        assert!(OwnerScope::Account("123".into()).includes("123"));
    }
}
