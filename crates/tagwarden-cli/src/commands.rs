//! Subcommand handlers
//!
//! Each handler returns `Ok(true)` when every phase ran to completion and
//! `Ok(false)` when a phase aborted on its top-level listing.

use clap::ArgMatches;
use std::path::PathBuf;
use tagwarden_core::audit::{AuditReport, RemediationOutcome, ResourceFinding};
use tagwarden_core::prelude::*;
use tagwarden_core::snapshot::{BackupOutcome, PruneOutcome, SnapshotPrune, VolumeBackup};

pub(crate) async fn audit(
    gateway: &InMemoryGateway,
    config: &GovernanceConfig,
    args: &ArgMatches,
) -> anyhow::Result<bool> {
    let settings = config.audit_settings();
    let auditor = TagAuditor::new(gateway, &settings);
    if settings.dry_run {
        println!("Dry run: no tags will be written.");
    }

    let instances = auditor.audit::<ComputeInstance>().await;
    let buckets = auditor.audit::<ObjectBucket>().await;

    let mut completed = true;
    let mut findings = Vec::new();
    for result in [instances, buckets] {
        match result {
            Ok(report) => {
                print_audit(&report);
                findings.extend(report.findings);
            }
            Err(e) => {
                println!("Audit aborted: {e}");
                completed = false;
            }
        }
    }

    if let Some(path) = args.get_one::<PathBuf>("report") {
        let report = TagReport::from_findings(&findings, &settings.policy);
        let written = report.write_csv(path)?;
        println!("Exported {written} records to {}", path.display());
    }
    Ok(completed)
}

fn print_audit(report: &AuditReport) {
    println!();
    println!("{} Tag Audit", report.kind);
    println!("{}", "-".repeat(40));
    for finding in &report.findings {
        println!("{}", finding_line(finding));
    }
    for unreadable in &report.unreadable {
        println!(
            "{} {}: could not read tags: {}",
            report.kind, unreadable.resource_id, unreadable.error
        );
    }

    let summary = report.summary();
    println!(
        "Compliant: {}  Non-compliant: {}  Remediated: {}  Failed: {}  Unreadable: {}",
        summary.compliant,
        summary.non_compliant,
        summary.remediated,
        summary.failed,
        summary.unreadable
    );
}

pub(crate) async fn backup(
    gateway: &InMemoryGateway,
    config: &GovernanceConfig,
    args: &ArgMatches,
) -> anyhow::Result<bool> {
    let phases = BackupPhases {
        create: !args.get_flag("skip-create"),
        prune: args.get_flag("prune"),
    };
    let manager = SnapshotLifecycleManager::new(gateway, config.snapshot_settings());
    let cycle = manager.run(phases).await;

    match &cycle.creation {
        Some(Ok(report)) => {
            println!();
            println!("Snapshot Creation");
            println!("{}", "-".repeat(40));
            for volume in &report.volumes {
                println!("{}", volume_line(volume));
            }
            println!("Created: {}  Failed: {}", report.created(), report.failed());
        }
        Some(Err(e)) => println!("Snapshot creation aborted: {e}"),
        None => {}
    }

    match &cycle.pruning {
        Some(Ok(report)) => {
            println!();
            println!(
                "Snapshot Pruning (retention {} days)",
                manager.settings().retention.days()
            );
            println!("{}", "-".repeat(40));
            for snapshot in &report.snapshots {
                println!("{}", snapshot_line(snapshot));
            }
            println!(
                "Deleted: {}  Failed: {}  Retained: {}",
                report.deleted(),
                report.failed(),
                report.retained()
            );
        }
        Some(Err(e)) => println!("Snapshot pruning aborted: {e}"),
        None => {}
    }

    Ok(!cycle.aborted())
}

fn finding_line(finding: &ResourceFinding) -> String {
    let id = format!("{} {}", finding.kind, finding.resource_id);
    match &finding.outcome {
        RemediationOutcome::Compliant => format!("{id}: compliant"),
        RemediationOutcome::NotRequested | RemediationOutcome::NoDefaults => {
            format!("{id}: missing {}", finding.missing.join(", "))
        }
        RemediationOutcome::DryRun(tags) => {
            format!("{id}: missing {}; would apply {tags}", finding.missing.join(", "))
        }
        RemediationOutcome::Applied(tags) => format!("{id}: applied {tags}"),
        RemediationOutcome::Failed(e) => format!("{id}: remediation failed: {}", e.source),
    }
}

fn volume_line(volume: &VolumeBackup) -> String {
    let label = format!("volume {} (EC2 {})", volume.volume_id, volume.instance_id);
    match &volume.outcome {
        BackupOutcome::Created(id) => format!("{label}: created snapshot {id}"),
        BackupOutcome::WouldCreate => format!("{label}: would snapshot"),
        BackupOutcome::Failed(e) => format!("{label}: failed: {e}"),
    }
}

fn snapshot_line(snapshot: &SnapshotPrune) -> String {
    let verdict = match &snapshot.outcome {
        PruneOutcome::Deleted => "deleted".to_string(),
        PruneOutcome::WouldDelete => "would delete".to_string(),
        PruneOutcome::NotOwned => "kept (not created by automation)".to_string(),
        PruneOutcome::WithinRetention => "kept (within retention)".to_string(),
        PruneOutcome::Failed(e) => format!("failed: {e}"),
    };
    format!(
        "snapshot {} ({} days old): {verdict}",
        snapshot.snapshot_id,
        snapshot.age.num_days()
    )
}

pub(crate) async fn report(
    gateway: &InMemoryGateway,
    config: &GovernanceConfig,
    args: &ArgMatches,
) -> anyhow::Result<bool> {
    let policy = &config.required_tags;
    let mut report = TagReport::new(policy);
    let mut completed = true;

    if let Err(e) = report.collect::<ComputeInstance>(gateway, policy).await {
        println!("Failed to fetch instances: {e}");
        completed = false;
    }
    if let Err(e) = report.collect::<ObjectBucket>(gateway, policy).await {
        println!("Failed to fetch buckets: {e}");
        completed = false;
    }

    let path = args
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(tagwarden_core::report::DEFAULT_REPORT_PATH));
    let written = report.write_csv(&path)?;
    println!("Exported {written} records to {}", path.display());
    Ok(completed)
}

pub(crate) async fn iam(gateway: &InMemoryGateway, config: &GovernanceConfig) -> anyhow::Result<bool> {
    let auditor = IdentityAuditor::new(gateway, config.stale_after_days);
    let report = match auditor.audit().await {
        Ok(report) => report,
        Err(e) => {
            println!("Failed to fetch IAM users: {e}");
            return Ok(false);
        }
    };

    println!();
    println!("IAM User Security Audit Report");
    println!("{}", "-".repeat(40));
    for user in &report.users {
        println!();
        println!("Checking user: {}", user.user);
        for finding in &user.findings {
            println!("{finding}");
        }
        for error in &user.errors {
            println!("Lookup failed: {error}");
        }
        if user.is_compliant() {
            println!("Compliant");
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tagwarden_core::gateway::SnapshotRequest;
    use tagwarden_core::resource::{ResourceId, ResourceKind, SnapshotId, VolumeId};

    fn finding(kind: ResourceKind, id: &str, outcome: RemediationOutcome) -> ResourceFinding {
        ResourceFinding {
            kind,
            resource_id: ResourceId::from(id),
            tags: TagSet::new(),
            missing: vec!["Owner".to_string(), "CostCenter".to_string()],
            outcome,
        }
    }

    #[test]
    fn finding_lines_carry_type_and_id() {
        let compliant = finding(ResourceKind::ComputeInstance, "i-1", RemediationOutcome::Compliant);
        assert_eq!(finding_line(&compliant), "EC2 i-1: compliant");

        let missing = finding(ResourceKind::ObjectBucket, "logs", RemediationOutcome::NoDefaults);
        assert_eq!(finding_line(&missing), "S3 logs: missing Owner, CostCenter");
    }

    #[test]
    fn volume_and_snapshot_lines_are_labelled() {
        let volume = VolumeBackup {
            instance_id: ResourceId::from("i-1"),
            volume_id: VolumeId::from("vol-a"),
            request: SnapshotRequest {
                volume_id: VolumeId::from("vol-a"),
                description: String::new(),
                tags: TagSet::new(),
            },
            outcome: BackupOutcome::Created(SnapshotId::from("snap-9")),
        };
        assert_eq!(volume_line(&volume), "volume vol-a (EC2 i-1): created snapshot snap-9");

        let snapshot = SnapshotPrune {
            snapshot_id: SnapshotId::from("snap-1"),
            age: Duration::days(8),
            outcome: PruneOutcome::Deleted,
        };
        assert_eq!(snapshot_line(&snapshot), "snapshot snap-1 (8 days old): deleted");
    }
}
