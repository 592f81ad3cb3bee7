//! In-memory gateway
//!
//! Serves every gateway capability from an [`Inventory`] document. Records
//! each call in order and supports injected failures, so it doubles as the
//! offline backend for the CLI and as the test double for the engines.

use super::inventory::{SnapshotEntry, SELF_OWNER};
use super::{
    AccessKeyRecord, BucketRecord, IdentityApi, InstanceFilter, InstanceRecord, Inventory,
    InventoryApi, MfaDevice, OwnerScope, SnapshotApi, SnapshotRecord, SnapshotRequest, TagLookup,
    TaggingApi, UserRecord,
};
use crate::error::GatewayError;
use crate::resource::{ResourceId, SnapshotId, VolumeId};
use crate::tags::TagSet;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A gateway operation as observed by [`InMemoryGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// Instance listing
    ListInstances(InstanceFilter),
    /// Bucket listing
    ListBuckets,
    /// Additive tag write
    CreateTags {
        /// Target resource
        resource_id: ResourceId,
        /// Tags sent
        tags: TagSet,
    },
    /// Bucket tag read
    GetBucketTags(ResourceId),
    /// Bucket tag overwrite
    PutBucketTags {
        /// Target bucket
        bucket: ResourceId,
        /// Full tag set sent
        tags: TagSet,
    },
    /// Snapshot creation
    CreateSnapshot(SnapshotRequest),
    /// Snapshot listing
    ListSnapshots(OwnerScope),
    /// Snapshot deletion
    DeleteSnapshot(SnapshotId),
    /// User listing
    ListUsers,
    /// MFA device listing
    ListMfaDevices(String),
    /// Access key listing
    ListAccessKeys(String),
}

impl GatewayCall {
    /// Check whether the call changes provider state
    #[inline]
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateTags { .. }
                | Self::PutBucketTags { .. }
                | Self::CreateSnapshot(_)
                | Self::DeleteSnapshot(_)
        )
    }
}

/// Listing calls that can be made unreachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Listing {
    /// `list_instances`
    Instances,
    /// `list_buckets`
    Buckets,
    /// `list_snapshots`
    Snapshots,
    /// `list_users`
    Users,
}

#[derive(Debug, Default)]
struct Faults {
    unreachable: HashSet<Listing>,
    writes: HashMap<String, GatewayError>,
    reads: HashMap<String, GatewayError>,
}

/// Gateway backed by an in-memory [`Inventory`]
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<Inventory>,
    calls: Mutex<Vec<GatewayCall>>,
    faults: Mutex<Faults>,
}

impl InMemoryGateway {
    /// Create gateway serving `inventory`
    #[must_use]
    pub fn new(inventory: Inventory) -> Self {
        Self {
            state: Mutex::new(inventory),
            ..Self::default()
        }
    }

    /// Make a listing fail as unreachable
    #[must_use]
    pub fn with_unreachable(self, listing: Listing) -> Self {
        self.faults.lock().unreachable.insert(listing);
        self
    }

    /// Make every write against `resource` fail with `error`
    ///
    /// Resource is an instance id, bucket name, volume id (snapshot
    /// creation) or snapshot id (deletion).
    #[must_use]
    pub fn with_failing_writes(self, resource: impl Into<String>, error: GatewayError) -> Self {
        self.faults.lock().writes.insert(resource.into(), error);
        self
    }

    /// Make tag reads and per-user lookups for `resource` fail with `error`
    #[must_use]
    pub fn with_failing_reads(self, resource: impl Into<String>, error: GatewayError) -> Self {
        self.faults.lock().reads.insert(resource.into(), error);
        self
    }

    /// Calls observed so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    /// State-changing calls observed so far, in order
    #[must_use]
    pub fn mutations(&self) -> Vec<GatewayCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    /// Copy of the current inventory
    #[must_use]
    pub fn inventory(&self) -> Inventory {
        self.state.lock().clone()
    }

    /// Current tags of an instance
    #[must_use]
    pub fn instance_tags(&self, id: &str) -> Option<TagSet> {
        self.state
            .lock()
            .instances
            .iter()
            .find(|instance| instance.id == id)
            .map(|instance| TagSet::from_raw(&instance.tags))
    }

    /// Current tags of a bucket; `None` for an unknown or untagged bucket
    #[must_use]
    pub fn bucket_tags(&self, name: &str) -> Option<TagSet> {
        self.state
            .lock()
            .buckets
            .iter()
            .find(|bucket| bucket.name == name)
            .and_then(|bucket| bucket.tags.as_deref().map(TagSet::from_raw))
    }

    /// Identifiers of all stored snapshots
    #[must_use]
    pub fn snapshot_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .snapshots
            .iter()
            .map(|snapshot| snapshot.id.clone())
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().push(call);
    }

    fn check_listing(&self, listing: Listing) -> Result<(), GatewayError> {
        if self.faults.lock().unreachable.contains(&listing) {
            return Err(GatewayError::Unreachable(format!("{listing:?} listing")));
        }
        Ok(())
    }

    fn check_write(&self, resource: &str) -> Result<(), GatewayError> {
        match self.faults.lock().writes.get(resource) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn check_read(&self, resource: &str) -> Result<(), GatewayError> {
        match self.faults.lock().reads.get(resource) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl InventoryApi for InMemoryGateway {
    async fn list_instances(
        &self,
        filter: InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, GatewayError> {
        self.record(GatewayCall::ListInstances(filter));
        self.check_listing(Listing::Instances)?;

        let state = self.state.lock();
        Ok(state
            .instances
            .iter()
            .filter(|instance| filter.matches(instance.state))
            .map(|instance| InstanceRecord {
                id: ResourceId::from(instance.id.as_str()),
                state: instance.state,
                tags: TagSet::from_raw(&instance.tags),
                volumes: instance.volumes.iter().map(|v| VolumeId::from(v.as_str())).collect(),
            })
            .collect())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketRecord>, GatewayError> {
        self.record(GatewayCall::ListBuckets);
        self.check_listing(Listing::Buckets)?;

        let state = self.state.lock();
        Ok(state
            .buckets
            .iter()
            .map(|bucket| BucketRecord {
                name: ResourceId::from(bucket.name.as_str()),
            })
            .collect())
    }
}

#[async_trait]
impl TaggingApi for InMemoryGateway {
    async fn create_tags(
        &self,
        resource_id: &ResourceId,
        tags: &TagSet,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::CreateTags {
            resource_id: resource_id.clone(),
            tags: tags.clone(),
        });
        self.check_write(resource_id.as_str())?;

        let mut state = self.state.lock();
        let instance = state
            .instances
            .iter_mut()
            .find(|instance| instance.id == resource_id.as_str())
            .ok_or_else(|| GatewayError::ResourceNotFound(resource_id.to_string()))?;
        instance.tags = TagSet::from_raw(&instance.tags).merged_with(tags).to_raw();
        Ok(())
    }

    async fn get_bucket_tags(&self, bucket: &ResourceId) -> Result<TagLookup, GatewayError> {
        self.record(GatewayCall::GetBucketTags(bucket.clone()));
        self.check_read(bucket.as_str())?;

        let state = self.state.lock();
        let entry = state
            .buckets
            .iter()
            .find(|entry| entry.name == bucket.as_str())
            .ok_or_else(|| GatewayError::ResourceNotFound(bucket.to_string()))?;
        Ok(match &entry.tags {
            Some(raw) => TagLookup::Found(TagSet::from_raw(raw)),
            None => TagLookup::Missing,
        })
    }

    async fn put_bucket_tags(&self, bucket: &ResourceId, tags: &TagSet) -> Result<(), GatewayError> {
        self.record(GatewayCall::PutBucketTags {
            bucket: bucket.clone(),
            tags: tags.clone(),
        });
        self.check_write(bucket.as_str())?;

        let mut state = self.state.lock();
        let entry = state
            .buckets
            .iter_mut()
            .find(|entry| entry.name == bucket.as_str())
            .ok_or_else(|| GatewayError::ResourceNotFound(bucket.to_string()))?;
        entry.tags = Some(tags.to_raw());
        Ok(())
    }
}

#[async_trait]
impl SnapshotApi for InMemoryGateway {
    async fn create_snapshot(&self, request: &SnapshotRequest) -> Result<SnapshotId, GatewayError> {
        self.record(GatewayCall::CreateSnapshot(request.clone()));
        self.check_write(request.volume_id.as_str())?;

        let mut state = self.state.lock();
        let attached = state
            .instances
            .iter()
            .any(|instance| instance.volumes.iter().any(|v| v == request.volume_id.as_str()));
        if !attached {
            return Err(GatewayError::ResourceNotFound(request.volume_id.to_string()));
        }

        let id = format!("snap-{}", Uuid::new_v4().simple());
        state.snapshots.push(SnapshotEntry {
            id: id.clone(),
            volume_id: request.volume_id.to_string(),
            created_at: Utc::now(),
            owner: SELF_OWNER.to_string(),
            description: request.description.clone(),
            tags: request.tags.to_raw(),
        });
        Ok(SnapshotId::from(id))
    }

    async fn list_snapshots(&self, owner: &OwnerScope) -> Result<Vec<SnapshotRecord>, GatewayError> {
        self.record(GatewayCall::ListSnapshots(owner.clone()));
        self.check_listing(Listing::Snapshots)?;

        let state = self.state.lock();
        Ok(state
            .snapshots
            .iter()
            .filter(|snapshot| owner.includes(&snapshot.owner))
            .map(|snapshot| SnapshotRecord {
                id: SnapshotId::from(snapshot.id.as_str()),
                volume_id: VolumeId::from(snapshot.volume_id.as_str()),
                created_at: snapshot.created_at,
                tags: TagSet::from_raw(&snapshot.tags),
            })
            .collect())
    }

    async fn delete_snapshot(&self, snapshot_id: &SnapshotId) -> Result<(), GatewayError> {
        self.record(GatewayCall::DeleteSnapshot(snapshot_id.clone()));
        self.check_write(snapshot_id.as_str())?;

        let mut state = self.state.lock();
        let before = state.snapshots.len();
        state.snapshots.retain(|snapshot| snapshot.id != snapshot_id.as_str());
        if state.snapshots.len() == before {
            return Err(GatewayError::ResourceNotFound(snapshot_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityApi for InMemoryGateway {
    async fn list_users(&self) -> Result<Vec<UserRecord>, GatewayError> {
        self.record(GatewayCall::ListUsers);
        self.check_listing(Listing::Users)?;

        let state = self.state.lock();
        Ok(state
            .users
            .iter()
            .map(|user| UserRecord {
                name: user.name.clone(),
                password_last_used: user.password_last_used,
            })
            .collect())
    }

    async fn list_mfa_devices(&self, user: &str) -> Result<Vec<MfaDevice>, GatewayError> {
        self.record(GatewayCall::ListMfaDevices(user.to_string()));
        self.check_read(user)?;

        let state = self.state.lock();
        let entry = state
            .users
            .iter()
            .find(|entry| entry.name == user)
            .ok_or_else(|| GatewayError::ResourceNotFound(user.to_string()))?;
        Ok(entry
            .mfa_devices
            .iter()
            .map(|serial| MfaDevice {
                serial: serial.clone(),
            })
            .collect())
    }

    async fn list_access_keys(&self, user: &str) -> Result<Vec<AccessKeyRecord>, GatewayError> {
        self.record(GatewayCall::ListAccessKeys(user.to_string()));
        self.check_read(user)?;

        let state = self.state.lock();
        let entry = state
            .users
            .iter()
            .find(|entry| entry.name == user)
            .ok_or_else(|| GatewayError::ResourceNotFound(user.to_string()))?;
        Ok(entry
            .access_keys
            .iter()
            .map(|key| AccessKeyRecord {
                id: key.id.clone(),
                created_at: key.created_at,
            })
            .collect())
    }
}
