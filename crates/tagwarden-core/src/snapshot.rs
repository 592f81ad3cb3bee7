//! Snapshot lifecycle management
//!
//! Two independent phases:
//! 1. **Creation**: snapshot every volume attached to a running instance,
//!    tagged so the snapshot can later be attributed to this tool
//! 2. **Pruning**: delete attributed snapshots older than the retention
//!    threshold
//!
//! A failure on one volume or snapshot is reported and the phase moves on.
//! Only a failed listing aborts a phase.

use crate::clock::{Clock, SystemClock};
use crate::error::GatewayError;
use crate::gateway::{InstanceFilter, OwnerScope, ResourceGateway, SnapshotRecord, SnapshotRequest};
use crate::resource::{ResourceId, SnapshotId, VolumeId};
use crate::tags::TagSet;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tag key marking who created a snapshot
pub const ATTRIBUTION_KEY: &str = "CreatedBy";
/// Attribution value for snapshots created by this tool
pub const ATTRIBUTION_VALUE: &str = "Automation";
/// Tag key carrying the project label
pub const PROJECT_KEY: &str = "Project";
/// Tag key carrying the creation timestamp
pub const TIMESTAMP_KEY: &str = "Timestamp";
/// `strftime` format of the timestamp tag
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H%M";
/// Default project label
pub const DEFAULT_PROJECT_LABEL: &str = "InfraBackup";
/// Default retention threshold in days
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Maximum age a snapshot may reach before it is eligible for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetentionPolicy {
    days: u32,
}

impl RetentionPolicy {
    /// Create policy keeping snapshots for `days`
    #[inline]
    #[must_use]
    pub fn new(days: u32) -> Self {
        Self { days }
    }

    /// Threshold in days
    #[inline]
    #[must_use]
    pub fn days(self) -> u32 {
        self.days
    }

    /// Threshold as a duration
    #[inline]
    #[must_use]
    pub fn max_age(self) -> Duration {
        Duration::days(i64::from(self.days))
    }

    /// Strictly older than the threshold at `now`
    ///
    /// A snapshot exactly at the threshold is kept.
    #[inline]
    #[must_use]
    pub fn is_expired(self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(created_at) > self.max_age()
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_DAYS)
    }
}

/// Snapshot lifecycle settings, fixed for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSettings {
    /// Value of the project tag on created snapshots
    pub project_label: String,
    /// Pruning threshold
    pub retention: RetentionPolicy,
    /// Whose snapshots are considered for pruning
    pub owner: OwnerScope,
    /// Report instead of creating or deleting
    pub dry_run: bool,
}

impl SnapshotSettings {
    /// With retention threshold
    #[inline]
    #[must_use]
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// With dry-run flag
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// With project label
    #[inline]
    #[must_use]
    pub fn with_project_label(mut self, label: impl Into<String>) -> Self {
        self.project_label = label.into();
        self
    }
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            project_label: DEFAULT_PROJECT_LABEL.to_string(),
            retention: RetentionPolicy::default(),
            owner: OwnerScope::SelfAccount,
            dry_run: false,
        }
    }
}

/// Which phases a backup cycle runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupPhases {
    /// Snapshot attached volumes
    pub create: bool,
    /// Delete expired attributed snapshots
    pub prune: bool,
}

impl Default for BackupPhases {
    fn default() -> Self {
        Self {
            create: true,
            prune: false,
        }
    }
}

/// Result of backing up one volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// Snapshot started
    Created(SnapshotId),
    /// Dry run; nothing was sent
    WouldCreate,
    /// Gateway refused the request
    Failed(GatewayError),
}

/// One volume processed by the creation phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBackup {
    /// Instance the volume is attached to
    pub instance_id: ResourceId,
    /// Volume copied
    pub volume_id: VolumeId,
    /// Request sent (or that would have been sent)
    pub request: SnapshotRequest,
    /// What happened
    pub outcome: BackupOutcome,
}

/// Creation phase results, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    /// Per-volume results
    pub volumes: Vec<VolumeBackup>,
}

impl BackupReport {
    /// Number of snapshots started
    #[must_use]
    pub fn created(&self) -> usize {
        self.count(|outcome| matches!(outcome, BackupOutcome::Created(_)))
    }

    /// Number of volumes that failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, BackupOutcome::Failed(_)))
    }

    fn count(&self, predicate: impl Fn(&BackupOutcome) -> bool) -> usize {
        self.volumes.iter().filter(|v| predicate(&v.outcome)).count()
    }
}

/// Result of considering one snapshot for pruning
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneOutcome {
    /// Deleted
    Deleted,
    /// Dry run; would have been deleted
    WouldDelete,
    /// Not created by this tool; never deleted
    NotOwned,
    /// Attributed but within retention
    WithinRetention,
    /// Gateway refused the delete
    Failed(GatewayError),
}

/// One snapshot considered by the pruning phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPrune {
    /// Snapshot considered
    pub snapshot_id: SnapshotId,
    /// Age at evaluation time
    pub age: Duration,
    /// What happened
    pub outcome: PruneOutcome,
}

/// Pruning phase results, in listing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Per-snapshot results
    pub snapshots: Vec<SnapshotPrune>,
}

impl PruneReport {
    /// Number of snapshots deleted
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.count(|outcome| matches!(outcome, PruneOutcome::Deleted))
    }

    /// Number of deletions that failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, PruneOutcome::Failed(_)))
    }

    /// Number of snapshots kept
    #[must_use]
    pub fn retained(&self) -> usize {
        self.count(|outcome| {
            matches!(outcome, PruneOutcome::NotOwned | PruneOutcome::WithinRetention)
        })
    }

    fn count(&self, predicate: impl Fn(&PruneOutcome) -> bool) -> usize {
        self.snapshots.iter().filter(|s| predicate(&s.outcome)).count()
    }
}

/// Results of a backup cycle; a phase that was not requested is `None`
#[derive(Debug, Default)]
pub struct BackupCycle {
    /// Creation phase
    pub creation: Option<Result<BackupReport, GatewayError>>,
    /// Pruning phase
    pub pruning: Option<Result<PruneReport, GatewayError>>,
}

impl BackupCycle {
    /// Check if any requested phase aborted on its listing call
    #[must_use]
    pub fn aborted(&self) -> bool {
        matches!(self.creation, Some(Err(_))) || matches!(self.pruning, Some(Err(_)))
    }
}

/// Creates and prunes attributed volume snapshots
#[derive(Debug)]
pub struct SnapshotLifecycleManager<'g, G, C = SystemClock> {
    gateway: &'g G,
    clock: C,
    settings: SnapshotSettings,
}

impl<'g, G> SnapshotLifecycleManager<'g, G, SystemClock>
where
    G: ResourceGateway,
{
    /// Create manager using the system clock
    #[inline]
    #[must_use]
    pub fn new(gateway: &'g G, settings: SnapshotSettings) -> Self {
        Self {
            gateway,
            clock: SystemClock,
            settings,
        }
    }
}

impl<'g, G, C> SnapshotLifecycleManager<'g, G, C>
where
    G: ResourceGateway,
    C: Clock,
{
    /// Replace the clock
    #[inline]
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> SnapshotLifecycleManager<'g, G, C2> {
        SnapshotLifecycleManager {
            gateway: self.gateway,
            clock,
            settings: self.settings,
        }
    }

    /// Settings in effect
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &SnapshotSettings {
        &self.settings
    }

    /// Run the requested phases, creation first
    ///
    /// A creation phase that aborts does not prevent pruning.
    pub async fn run(&self, phases: BackupPhases) -> BackupCycle {
        let mut cycle = BackupCycle::default();
        if phases.create {
            let result = self.create_backups().await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "could not fetch instances for backup: {e}");
            }
            cycle.creation = Some(result);
        }
        if phases.prune {
            let result = self.prune_expired().await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "could not list snapshots for pruning: {e}");
            }
            cycle.pruning = Some(result);
        }
        cycle
    }

    /// Snapshot every volume attached to a running instance
    ///
    /// # Errors
    /// Returns the gateway error if the instance listing fails; per-volume
    /// failures are recorded in the report instead.
    pub async fn create_backups(&self) -> Result<BackupReport, GatewayError> {
        let instances = self.gateway.list_instances(InstanceFilter::Running).await?;
        let mut report = BackupReport::default();

        for instance in instances {
            for volume_id in instance.volumes {
                let request = self.backup_request(&instance.id, &volume_id);
                let outcome = self.create_one(&instance.id, &request).await;
                report.volumes.push(VolumeBackup {
                    instance_id: instance.id.clone(),
                    volume_id,
                    request,
                    outcome,
                });
            }
        }

        tracing::info!(
            created = report.created(),
            failed = report.failed(),
            "snapshot creation finished"
        );
        Ok(report)
    }

    /// Delete attributed snapshots older than the retention threshold
    ///
    /// # Errors
    /// Returns the gateway error if the snapshot listing fails; per-snapshot
    /// failures are recorded in the report instead.
    pub async fn prune_expired(&self) -> Result<PruneReport, GatewayError> {
        let snapshots = self.gateway.list_snapshots(&self.settings.owner).await?;
        let now = self.clock.now();
        let mut report = PruneReport::default();

        for snapshot in snapshots {
            let age = now.signed_duration_since(snapshot.created_at);
            let outcome = self.prune_one(&snapshot, now).await;
            report.snapshots.push(SnapshotPrune {
                snapshot_id: snapshot.id,
                age,
                outcome,
            });
        }

        tracing::info!(
            deleted = report.deleted(),
            failed = report.failed(),
            retained = report.retained(),
            retention_days = self.settings.retention.days(),
            "snapshot pruning finished"
        );
        Ok(report)
    }

    /// Build the tagged request for one volume; the timestamp is read per call
    fn backup_request(&self, instance_id: &ResourceId, volume_id: &VolumeId) -> SnapshotRequest {
        let timestamp = self.clock.now().format(TIMESTAMP_FORMAT).to_string();
        let tags = TagSet::new()
            .with(ATTRIBUTION_KEY, ATTRIBUTION_VALUE)
            .with(PROJECT_KEY, self.settings.project_label.as_str())
            .with(TIMESTAMP_KEY, timestamp.as_str());
        SnapshotRequest {
            volume_id: volume_id.clone(),
            description: format!("Backup {volume_id} from {instance_id} at {timestamp}"),
            tags,
        }
    }

    async fn create_one(&self, instance_id: &ResourceId, request: &SnapshotRequest) -> BackupOutcome {
        let volume_id = &request.volume_id;
        if self.settings.dry_run {
            tracing::info!(
                instance_id = %instance_id,
                volume_id = %volume_id,
                "[DRY-RUN] volume {volume_id} from {instance_id} would be snapshotted"
            );
            return BackupOutcome::WouldCreate;
        }

        match self.gateway.create_snapshot(request).await {
            Ok(snapshot_id) => {
                tracing::info!(
                    instance_id = %instance_id,
                    volume_id = %volume_id,
                    snapshot_id = %snapshot_id,
                    "volume {volume_id}: created snapshot {snapshot_id}"
                );
                BackupOutcome::Created(snapshot_id)
            }
            Err(e) => {
                tracing::error!(
                    instance_id = %instance_id,
                    volume_id = %volume_id,
                    error = %e,
                    "volume {volume_id}: failed to create snapshot: {e}"
                );
                BackupOutcome::Failed(e)
            }
        }
    }

    async fn prune_one(&self, snapshot: &SnapshotRecord, now: DateTime<Utc>) -> PruneOutcome {
        let snapshot_id = &snapshot.id;
        if snapshot.tags.get(ATTRIBUTION_KEY) != Some(ATTRIBUTION_VALUE) {
            tracing::debug!(snapshot_id = %snapshot_id, "snapshot {snapshot_id} not created by automation; kept");
            return PruneOutcome::NotOwned;
        }
        if !self.settings.retention.is_expired(snapshot.created_at, now) {
            return PruneOutcome::WithinRetention;
        }

        let days = self.settings.retention.days();
        if self.settings.dry_run {
            tracing::info!(
                snapshot_id = %snapshot_id,
                "[DRY-RUN] snapshot {snapshot_id} older than {days} days would be deleted"
            );
            return PruneOutcome::WouldDelete;
        }

        match self.gateway.delete_snapshot(snapshot_id).await {
            Ok(()) => {
                tracing::info!(
                    snapshot_id = %snapshot_id,
                    "snapshot {snapshot_id}: deleted (older than {days} days)"
                );
                PruneOutcome::Deleted
            }
            Err(e) => {
                tracing::error!(
                    snapshot_id = %snapshot_id,
                    error = %e,
                    "snapshot {snapshot_id}: failed to delete: {e}"
                );
                PruneOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn retention_is_strictly_greater_than() {
        let policy = RetentionPolicy::new(7);
        let now = at(15, 12);
        assert!(!policy.is_expired(now - Duration::days(7), now));
        assert!(policy.is_expired(now - Duration::days(7) - Duration::seconds(1), now));
        assert!(policy.is_expired(now - Duration::days(8), now));
        assert!(!policy.is_expired(now - Duration::days(1), now));
    }

    #[test]
    fn future_snapshots_are_not_expired() {
        let policy = RetentionPolicy::new(0);
        let now = at(15, 12);
        assert!(!policy.is_expired(now + Duration::hours(1), now));
        assert!(!policy.is_expired(now, now));
    }

    #[test]
    fn default_settings() {
        let settings = SnapshotSettings::default();
        assert_eq!(settings.retention.days(), 7);
        assert_eq!(settings.project_label, "InfraBackup");
        assert_eq!(settings.owner, OwnerScope::SelfAccount);
        assert!(!settings.dry_run);
        assert_eq!(BackupPhases::default(), BackupPhases { create: true, prune: false });
    }

    #[test]
    fn cycle_abort_detection() {
        let cycle = BackupCycle {
            creation: Some(Ok(BackupReport::default())),
            pruning: Some(Err(GatewayError::Unreachable("snapshots".into()))),
        };
        assert!(cycle.aborted());
        assert!(!BackupCycle::default().aborted());
    }
}
