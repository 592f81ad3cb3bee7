//! Error types for Tagwarden
//!
//! Three tiers of failure:
//! - [`GatewayError`]: a classified failure reported by the cloud gateway
//! - [`RemediationError`]: a write against one resource failed
//! - [`GovernanceError`]: anything that stops a run or a whole phase

use crate::resource::{ResourceId, ResourceKind};

/// Main Tagwarden error type
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    /// A top-level gateway call failed
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A single resource could not be remediated
    #[error(transparent)]
    Remediation(#[from] RemediationError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// The inventory document could not be parsed or rendered
    #[error("inventory error: {0}")]
    Inventory(String),

    /// Filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GovernanceError {
    /// Create configuration error
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if the error means the gateway could not be reached at all
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Gateway(e) if e.is_transport())
    }
}

/// Classified gateway failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The provider endpoint could not be reached
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The resource itself does not exist
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// Caller lacks permission for the operation
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Request rate exceeded
    #[error("request throttled: {0}")]
    Throttled(String),

    /// Provider rejected the request
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl GatewayError {
    /// Transport failures abort the phase that issued the call
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Check if the resource itself is gone
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound(_))
    }

    /// Check if retrying later could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Throttled(_))
    }
}

/// A write against one resource failed
///
/// Carries the resource type and identifier so the caller can report the
/// failure and move on to the next resource.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} {resource_id}: {operation} failed: {source}")]
pub struct RemediationError {
    /// Resource type
    pub kind: ResourceKind,
    /// Provider-assigned identifier
    pub resource_id: ResourceId,
    /// Operation that failed
    pub operation: &'static str,
    /// Underlying gateway failure
    #[source]
    pub source: GatewayError,
}

impl RemediationError {
    /// Create new remediation error
    #[inline]
    #[must_use]
    pub fn new(
        kind: ResourceKind,
        resource_id: ResourceId,
        operation: &'static str,
        source: GatewayError,
    ) -> Self {
        Self {
            kind,
            resource_id,
            operation,
            source,
        }
    }
}

/// Result alias for Tagwarden operations
pub type Result<T, E = GovernanceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_classification() {
        assert!(GatewayError::Unreachable("ec2".into()).is_transport());
        assert!(!GatewayError::AccessDenied("ec2".into()).is_transport());
        assert!(GatewayError::ResourceNotFound("b".into()).is_not_found());
        assert!(GatewayError::Throttled("b".into()).is_retryable());
        assert!(!GatewayError::Rejected("b".into()).is_retryable());
    }

    #[test]
    fn remediation_error_display_has_resource_prefix() {
        let err = RemediationError::new(
            ResourceKind::ObjectBucket,
            ResourceId::from("logs"),
            "put-tags",
            GatewayError::AccessDenied("logs".into()),
        );
        let rendered = err.to_string();
        assert!(rendered.starts_with("S3 logs"), "{rendered}");
        assert!(rendered.contains("put-tags"));
    }

    #[test]
    fn governance_error_transport() {
        let err = GovernanceError::from(GatewayError::Unreachable("s3".into()));
        assert!(err.is_transport());
        assert!(!GovernanceError::config("bad").is_transport());
    }
}
