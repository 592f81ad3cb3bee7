//! Identity hygiene audit
//!
//! Flags users who never logged in or have not logged in recently, users
//! without MFA, and access keys past the stale threshold. Ages are whole
//! days and the threshold comparison is strictly greater-than.

use crate::clock::{Clock, SystemClock};
use crate::error::GatewayError;
use crate::gateway::{ResourceGateway, UserRecord};
use chrono::{DateTime, Utc};
use std::fmt;

/// Default stale threshold in days
pub const DEFAULT_STALE_AFTER_DAYS: u32 = 90;

/// A hygiene problem found on one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityFinding {
    /// No console login recorded
    NeverLoggedIn,
    /// Last console login is past the threshold
    StaleLogin {
        /// Whole days since last login
        days: i64,
    },
    /// No MFA device registered
    NoMfa,
    /// Access key is past the threshold
    StaleAccessKey {
        /// Access key id
        key_id: String,
        /// Whole days since creation
        days: i64,
    },
}

impl fmt::Display for IdentityFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverLoggedIn => f.write_str("Never logged in"),
            Self::StaleLogin { days } => write!(f, "Last login: {days} days ago"),
            Self::NoMfa => f.write_str("No MFA"),
            Self::StaleAccessKey { key_id, days } => {
                write!(f, "Access key {key_id} is {days} days old")
            }
        }
    }
}

/// Audit result for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAudit {
    /// User name
    pub user: String,
    /// Problems found
    pub findings: Vec<IdentityFinding>,
    /// Lookups that failed for this user
    pub errors: Vec<GatewayError>,
}

impl UserAudit {
    /// No findings and every lookup succeeded
    #[inline]
    #[must_use]
    pub fn is_compliant(&self) -> bool {
        self.findings.is_empty() && self.errors.is_empty()
    }
}

/// Identity audit results, in listing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityReport {
    /// Per-user results
    pub users: Vec<UserAudit>,
}

impl IdentityReport {
    /// Number of users with at least one finding
    #[must_use]
    pub fn flagged(&self) -> usize {
        self.users.iter().filter(|u| !u.findings.is_empty()).count()
    }

    /// Number of users with a failed lookup
    #[must_use]
    pub fn failed(&self) -> usize {
        self.users.iter().filter(|u| !u.errors.is_empty()).count()
    }
}

/// Runs the identity hygiene audit
#[derive(Debug)]
pub struct IdentityAuditor<'g, G, C = SystemClock> {
    gateway: &'g G,
    clock: C,
    stale_after_days: u32,
}

impl<'g, G> IdentityAuditor<'g, G, SystemClock>
where
    G: ResourceGateway,
{
    /// Create auditor with the system clock
    #[inline]
    #[must_use]
    pub fn new(gateway: &'g G, stale_after_days: u32) -> Self {
        Self {
            gateway,
            clock: SystemClock,
            stale_after_days,
        }
    }
}

impl<'g, G, C> IdentityAuditor<'g, G, C>
where
    G: ResourceGateway,
    C: Clock,
{
    /// Replace the clock
    #[inline]
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> IdentityAuditor<'g, G, C2> {
        IdentityAuditor {
            gateway: self.gateway,
            clock,
            stale_after_days: self.stale_after_days,
        }
    }

    /// Audit every user
    ///
    /// # Errors
    /// Returns the gateway error if the user listing fails.
    pub async fn audit(&self) -> Result<IdentityReport, GatewayError> {
        let users = self.gateway.list_users().await?;
        let now = self.clock.now();
        let mut report = IdentityReport::default();

        for user in &users {
            let audit = self.audit_user(user, now).await;
            if audit.is_compliant() {
                tracing::info!(user = %audit.user, "user {}: compliant", audit.user);
            }
            for finding in &audit.findings {
                tracing::warn!(user = %audit.user, "user {}: {finding}", audit.user);
            }
            report.users.push(audit);
        }

        tracing::info!(
            users = report.users.len(),
            flagged = report.flagged(),
            failed = report.failed(),
            "identity audit finished"
        );
        Ok(report)
    }

    async fn audit_user(&self, user: &UserRecord, now: DateTime<Utc>) -> UserAudit {
        let mut audit = UserAudit {
            user: user.name.clone(),
            findings: Vec::new(),
            errors: Vec::new(),
        };

        match user.password_last_used {
            Some(last) => {
                let days = now.signed_duration_since(last).num_days();
                if self.is_stale(days) {
                    audit.findings.push(IdentityFinding::StaleLogin { days });
                }
            }
            None => audit.findings.push(IdentityFinding::NeverLoggedIn),
        }

        match self.gateway.list_mfa_devices(&user.name).await {
            Ok(devices) if devices.is_empty() => audit.findings.push(IdentityFinding::NoMfa),
            Ok(_) => {}
            Err(e) => lookup_failed(&mut audit, "MFA devices", e),
        }

        match self.gateway.list_access_keys(&user.name).await {
            Ok(keys) => {
                for key in keys {
                    let days = now.signed_duration_since(key.created_at).num_days();
                    if self.is_stale(days) {
                        audit.findings.push(IdentityFinding::StaleAccessKey {
                            key_id: key.id,
                            days,
                        });
                    }
                }
            }
            Err(e) => lookup_failed(&mut audit, "access keys", e),
        }

        audit
    }

    fn is_stale(&self, days: i64) -> bool {
        days > i64::from(self.stale_after_days)
    }
}

fn lookup_failed(audit: &mut UserAudit, what: &str, error: GatewayError) {
    tracing::error!(user = %audit.user, error = %error, "user {}: could not list {what}: {error}", audit.user);
    audit.errors.push(error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_messages() {
        assert_eq!(IdentityFinding::NeverLoggedIn.to_string(), "Never logged in");
        assert_eq!(
            IdentityFinding::StaleLogin { days: 120 }.to_string(),
            "Last login: 120 days ago"
        );
        assert_eq!(IdentityFinding::NoMfa.to_string(), "No MFA");
        assert_eq!(
            IdentityFinding::StaleAccessKey {
                key_id: "AKIA1".into(),
                days: 91
            }
            .to_string(),
            "Access key AKIA1 is 91 days old"
        );
    }

    #[test]
    fn report_counts() {
        let report = IdentityReport {
            users: vec![
                UserAudit {
                    user: "a".into(),
                    findings: vec![],
                    errors: vec![],
                },
                UserAudit {
                    user: "b".into(),
                    findings: vec![IdentityFinding::NoMfa],
                    errors: vec![GatewayError::Throttled("b".into())],
                },
            ],
        };
        assert_eq!(report.flagged(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.users[0].is_compliant());
    }
}
