//! Testing utilities for Tagwarden workspace
//!
//! Shared fixtures and clocks.

#![allow(missing_docs)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tagwarden_core::gateway::{
    AccessKeyEntry, BucketEntry, InstanceEntry, InstanceState, Inventory, SnapshotEntry, UserEntry,
};
use tagwarden_core::snapshot::{ATTRIBUTION_KEY, ATTRIBUTION_VALUE};
use tagwarden_core::{Clock, RawTag};

/// Reference instant every fixture is relative to
pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    reference_now() - Duration::days(days)
}

pub fn raw_tags(pairs: &[(&str, &str)]) -> Vec<RawTag> {
    pairs.iter().map(|(k, v)| RawTag::new(*k, *v)).collect()
}

pub fn instance(id: &str, tags: &[(&str, &str)], volumes: &[&str]) -> InstanceEntry {
    InstanceEntry {
        id: id.to_string(),
        state: InstanceState::Running,
        tags: raw_tags(tags),
        volumes: volumes.iter().map(|v| (*v).to_string()).collect(),
    }
}

pub fn stopped_instance(id: &str, volumes: &[&str]) -> InstanceEntry {
    InstanceEntry {
        state: InstanceState::Stopped,
        ..instance(id, &[], volumes)
    }
}

pub fn bucket(name: &str, tags: &[(&str, &str)]) -> BucketEntry {
    BucketEntry {
        name: name.to_string(),
        tags: Some(raw_tags(tags)),
    }
}

/// Bucket that has never been tagged
pub fn untagged_bucket(name: &str) -> BucketEntry {
    BucketEntry {
        name: name.to_string(),
        tags: None,
    }
}

pub fn snapshot(id: &str, age_days: i64, tags: &[(&str, &str)]) -> SnapshotEntry {
    SnapshotEntry {
        id: id.to_string(),
        volume_id: format!("vol-of-{id}"),
        created_at: days_ago(age_days),
        owner: "self".to_string(),
        description: String::new(),
        tags: raw_tags(tags),
    }
}

/// Snapshot carrying the automation attribution tag
pub fn automation_snapshot(id: &str, age_days: i64) -> SnapshotEntry {
    snapshot(id, age_days, &[(ATTRIBUTION_KEY, ATTRIBUTION_VALUE)])
}

pub fn user(name: &str, last_login_days: Option<i64>, mfa: bool) -> UserEntry {
    UserEntry {
        name: name.to_string(),
        password_last_used: last_login_days.map(days_ago),
        mfa_devices: if mfa {
            vec![format!("arn:mfa/{name}")]
        } else {
            Vec::new()
        },
        access_keys: Vec::new(),
    }
}

pub fn access_key(id: &str, age_days: i64) -> AccessKeyEntry {
    AccessKeyEntry {
        id: id.to_string(),
        created_at: days_ago(age_days),
    }
}

#[derive(Debug, Default)]
pub struct InventoryBuilder {
    inventory: Inventory,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance(mut self, entry: InstanceEntry) -> Self {
        self.inventory.instances.push(entry);
        self
    }

    pub fn bucket(mut self, entry: BucketEntry) -> Self {
        self.inventory.buckets.push(entry);
        self
    }

    pub fn snapshot(mut self, entry: SnapshotEntry) -> Self {
        self.inventory.snapshots.push(entry);
        self
    }

    pub fn user(mut self, entry: UserEntry) -> Self {
        self.inventory.users.push(entry);
        self
    }

    pub fn build(self) -> Inventory {
        self.inventory
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(reference_now())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Clock that advances by `step` after every reading
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl SteppingClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }

    /// Starts at [`reference_now`] and advances one minute per reading
    pub fn per_minute() -> Self {
        Self::new(reference_now(), Duration::minutes(1))
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock();
        let now = *next;
        *next = now + self.step;
        now
    }
}
