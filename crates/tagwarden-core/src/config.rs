//! Run configuration
//!
//! Built once at start-up from defaults, an optional TOML file and CLI
//! overrides (in that order), then shared read-only by every phase.
//!
//! ```toml
//! required_tags = ["Owner", "Environment", "CostCenter"]
//! retention_days = 7
//! project_label = "InfraBackup"
//! stale_after_days = 90
//! dry_run = false
//!
//! [default_tags]
//! Environment = "dev"
//! ```

use crate::audit::AuditSettings;
use crate::error::{GovernanceError, Result};
use crate::identity::DEFAULT_STALE_AFTER_DAYS;
use crate::policy::{DefaultTagMapping, RequiredTagPolicy};
use crate::snapshot::{
    RetentionPolicy, SnapshotSettings, DEFAULT_PROJECT_LABEL, DEFAULT_RETENTION_DAYS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tagwarden configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GovernanceConfig {
    /// Keys every resource must carry
    pub required_tags: RequiredTagPolicy,
    /// Fallback values for missing keys
    pub default_tags: DefaultTagMapping,
    /// Snapshot retention threshold in days
    pub retention_days: u32,
    /// Project tag value on created snapshots
    pub project_label: String,
    /// Identity stale threshold in days
    pub stale_after_days: u32,
    /// Report instead of writing
    pub dry_run: bool,
}

impl GovernanceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns a configuration error if the text is not valid TOML, has
    /// unknown keys, or fails [`GovernanceConfig::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| GovernanceError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be read, otherwise as
    /// [`GovernanceConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| GovernanceError::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// With required tag policy
    #[inline]
    #[must_use]
    pub fn with_required_tags(mut self, policy: RequiredTagPolicy) -> Self {
        self.required_tags = policy;
        self
    }

    /// With extra defaults; entries override configured ones
    #[inline]
    #[must_use]
    pub fn with_default_tags(mut self, defaults: &DefaultTagMapping) -> Self {
        self.default_tags = self.default_tags.overlaid_with(defaults);
        self
    }

    /// With retention threshold
    #[inline]
    #[must_use]
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// With identity stale threshold
    #[inline]
    #[must_use]
    pub fn with_stale_after_days(mut self, days: u32) -> Self {
        self.stale_after_days = days;
        self
    }

    /// With dry-run flag
    #[inline]
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check invariants not enforced by the types
    ///
    /// # Errors
    /// Returns a configuration error for a blank project label, an empty
    /// required tag list or a blank default tag key.
    pub fn validate(&self) -> Result<()> {
        if self.project_label.trim().is_empty() {
            return Err(GovernanceError::config("project_label must not be empty"));
        }
        if self.required_tags.is_empty() {
            return Err(GovernanceError::config("required_tags must not be empty"));
        }
        if self.default_tags.keys().any(|key| key.trim().is_empty()) {
            return Err(GovernanceError::config("default_tags keys must not be empty"));
        }
        Ok(())
    }

    /// Settings for the tag audit
    #[must_use]
    pub fn audit_settings(&self) -> AuditSettings {
        AuditSettings {
            policy: self.required_tags.clone(),
            defaults: self.default_tags.clone(),
            dry_run: self.dry_run,
        }
    }

    /// Settings for the snapshot lifecycle
    #[must_use]
    pub fn snapshot_settings(&self) -> SnapshotSettings {
        SnapshotSettings::default()
            .with_project_label(self.project_label.as_str())
            .with_retention(RetentionPolicy::new(self.retention_days))
            .with_dry_run(self.dry_run)
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            required_tags: RequiredTagPolicy::default(),
            default_tags: DefaultTagMapping::default(),
            retention_days: DEFAULT_RETENTION_DAYS,
            project_label: DEFAULT_PROJECT_LABEL.to_string(),
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
            dry_run: false,
        }
    }
}
