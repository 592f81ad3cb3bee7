//! Serializable inventory document
//!
//! Describes an account's instances, buckets, snapshots and users in the
//! provider's own wire shapes. Loaded from JSON or YAML.

use crate::error::GovernanceError;
use crate::gateway::InstanceState;
use crate::tags::RawTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Owner value used for snapshots created by the calling account
pub(crate) const SELF_OWNER: &str = "self";

fn self_owner() -> String {
    SELF_OWNER.to_string()
}

/// Account inventory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    /// Compute instances
    pub instances: Vec<InstanceEntry>,
    /// Object storage buckets
    pub buckets: Vec<BucketEntry>,
    /// Volume snapshots
    pub snapshots: Vec<SnapshotEntry>,
    /// Identity users
    pub users: Vec<UserEntry>,
}

/// Compute instance entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceEntry {
    /// Instance id
    pub id: String,
    /// Lifecycle state
    #[serde(default)]
    pub state: InstanceState,
    /// Raw tag list
    #[serde(default)]
    pub tags: Vec<RawTag>,
    /// Attached volume ids
    #[serde(default)]
    pub volumes: Vec<String>,
}

/// Bucket entry; `tags: None` means the bucket has no tag set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntry {
    /// Bucket name
    pub name: String,
    /// Raw tag list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<RawTag>>,
}

/// Snapshot entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Snapshot id
    pub id: String,
    /// Source volume id
    pub volume_id: String,
    /// Start time
    pub created_at: DateTime<Utc>,
    /// Owning account; `self` for the caller
    #[serde(default = "self_owner")]
    pub owner: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Raw tag list
    #[serde(default)]
    pub tags: Vec<RawTag>,
}

/// Identity user entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    /// User name
    pub name: String,
    /// Last console login
    #[serde(default)]
    pub password_last_used: Option<DateTime<Utc>>,
    /// MFA device serials
    #[serde(default)]
    pub mfa_devices: Vec<String>,
    /// Access keys
    #[serde(default)]
    pub access_keys: Vec<AccessKeyEntry>,
}

/// Access key entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyEntry {
    /// Access key id
    pub id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Inventory {
    /// Parse a JSON document
    ///
    /// # Errors
    /// Returns an inventory error if the document is malformed.
    pub fn from_json_str(input: &str) -> Result<Self, GovernanceError> {
        serde_json::from_str(input).map_err(|e| GovernanceError::Inventory(e.to_string()))
    }

    /// Parse a YAML document
    ///
    /// # Errors
    /// Returns an inventory error if the document is malformed.
    pub fn from_yaml_str(input: &str) -> Result<Self, GovernanceError> {
        serde_yaml::from_str(input).map_err(|e| GovernanceError::Inventory(e.to_string()))
    }

    /// Load from a file; `.yaml`/`.yml` are YAML, anything else JSON
    ///
    /// # Errors
    /// Returns an io error if the file cannot be read, or an inventory error
    /// if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, GovernanceError> {
        let contents = std::fs::read_to_string(path)?;
        if is_yaml(path) {
            Self::from_yaml_str(&contents)
        } else {
            Self::from_json_str(&contents)
        }
    }

    /// Write to a file in the format implied by its extension
    ///
    /// # Errors
    /// Returns an inventory error if rendering fails, or an io error if the
    /// file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), GovernanceError> {
        let rendered = if is_yaml(path) {
            serde_yaml::to_string(self).map_err(|e| GovernanceError::Inventory(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| GovernanceError::Inventory(e.to_string()))?
        };
        std::fs::write(path, rendered)?;
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}
