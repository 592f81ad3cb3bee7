//! Tagwarden Core - cloud resource governance
//!
//! Two independent workflows over a cloud gateway:
//! - Tag compliance: evaluate every instance and bucket against a required
//!   tag policy, plan remediation from operator defaults, and apply it with
//!   each resource type's own write semantics
//! - Snapshot lifecycle: snapshot volumes of running instances and prune
//!   attributed snapshots past the retention threshold
//!
//! Plus a tag report export and an identity hygiene audit.
//!
//! # Example
//!
//! ```rust,ignore
//! use tagwarden_core::prelude::*;
//!
//! # async fn example(inventory: Inventory) -> Result<(), GovernanceError> {
//! let gateway = InMemoryGateway::new(inventory);
//! let config = GovernanceConfig::new().with_dry_run(true);
//! let settings = config.audit_settings();
//!
//! let report = TagAuditor::new(&gateway, &settings)
//!     .audit::<ComputeInstance>()
//!     .await?;
//! println!("{} non-compliant", report.summary().non_compliant);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod applier;
pub mod audit;
pub mod clock;
pub mod compliance;
pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod policy;
pub mod remediation;
pub mod report;
pub mod resource;
pub mod snapshot;
pub mod tags;

// Re-exports for convenience
pub use applier::{ApplyOutcome, TagApplier};
pub use audit::{
    AuditReport, AuditSettings, AuditSummary, RemediationOutcome, ResourceFinding, TagAuditor,
    UnreadableResource,
};
pub use clock::{Clock, SystemClock};
pub use compliance::{evaluate, missing_keys, ComplianceResult};
pub use config::GovernanceConfig;
pub use error::{GatewayError, GovernanceError, RemediationError, Result};
pub use gateway::{InMemoryGateway, Inventory, ResourceGateway};
pub use identity::{IdentityAuditor, IdentityFinding, IdentityReport, UserAudit};
pub use policy::{DefaultTag, DefaultTagMapping, RequiredTagPolicy};
pub use remediation::{plan, remediation_tags, RemediationPlan};
pub use report::{ReportRow, TagReport};
pub use resource::{
    ComputeInstance, ObjectBucket, Resource, ResourceId, ResourceKind, SnapshotId, TagWriteMode,
    VolumeId,
};
pub use snapshot::{
    BackupCycle, BackupOutcome, BackupPhases, BackupReport, PruneOutcome, PruneReport,
    RetentionPolicy, SnapshotLifecycleManager, SnapshotSettings,
};
pub use tags::{RawTag, TagSet};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Tagwarden Core
    pub use crate::{
        AuditSettings, BackupPhases, ComputeInstance, DefaultTagMapping, GatewayError,
        GovernanceConfig, GovernanceError, IdentityAuditor, InMemoryGateway, Inventory,
        ObjectBucket, RequiredTagPolicy, Resource, ResourceGateway, SnapshotLifecycleManager,
        TagAuditor, TagReport, TagSet,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
