//! Approval error types.

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_capabilities::{Capability, CapabilityError, PermissionLevel};

/// Why a capability check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The suite's domain never grants this capability.
    NotConfigured,
    /// The user answered "no, never".
    UserDenied,
    /// The user already said "not now" during this run.
    DeniedThisSession,
    /// The user dismissed the question.
    Cancelled,
    /// The question was interrupted or timed out before an answer.
    Interrupted,
    /// A non-negotiable check found anything other than `Allow`.
    NotPermitted,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotConfigured => "not granted to this domain",
            Self::UserDenied => "denied by the user",
            Self::DeniedThisSession => "denied for this session",
            Self::Cancelled => "the question was cancelled",
            Self::Interrupted => "the question was interrupted",
            Self::NotPermitted => "not permitted",
        };
        f.write_str(text)
    }
}

/// A failed capability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityDenied {
    /// The capability that was checked.
    pub capability: Capability,
    /// Why it was denied.
    pub reason: DenialReason,
    /// Message fit for showing to the user.
    pub message: String,
}

impl CapabilityDenied {
    /// Build a denial with a message naming the suite.
    #[must_use]
    pub fn new(capability: Capability, reason: DenialReason, suite_name: &str) -> Self {
        Self {
            capability,
            reason,
            message: format!("{suite_name} may not use {capability}: {reason}"),
        }
    }
}

impl fmt::Display for CapabilityDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Errors from the security context.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// A capability check failed.
    #[error("capability denied: {0}")]
    Denied(CapabilityDenied),

    /// A blanket grant would combine auto-invocation with a capability that
    /// can cost money.
    #[error("{requested} cannot be blanket-granted while {conflicting} is blanket-granted")]
    MutuallyExclusive {
        /// Capability being changed.
        requested: Capability,
        /// Capability already blanket-granted.
        conflicting: Capability,
    },

    /// A settings change outside what the ceiling allows.
    #[error("cannot set {capability} to {level}: {reason}")]
    InvalidSettingsChange {
        /// Capability being changed.
        capability: Capability,
        /// Requested level.
        level: PermissionLevel,
        /// Why it was refused.
        reason: String,
    },

    /// The domain policy could not be resolved.
    #[error(transparent)]
    Policy(#[from] CapabilityError),
}

impl ApprovalError {
    /// The denial, if this is one.
    #[must_use]
    pub fn as_denied(&self) -> Option<&CapabilityDenied> {
        match self {
            Self::Denied(denied) => Some(denied),
            _ => None,
        }
    }

    /// The denial reason, if this is a denial.
    #[must_use]
    pub fn denial_reason(&self) -> Option<DenialReason> {
        self.as_denied().map(|d| d.reason)
    }
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
