//! Capability error types.

use thiserror::Error;

/// Errors that can occur while resolving capabilities and domain policy.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// A capability name did not match any known capability.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// A persisted permission level byte is not a known level.
    #[error("invalid permission level byte: {0:#04x}")]
    InvalidLevel(u8),

    /// The policy text is malformed. No part of it is used.
    #[error("policy parse error at line {line}: {message}")]
    PolicyParse {
        /// 1-based line number of the offending directive.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// The policy file could not be read.
    #[error("failed to read policy {path}: {source}")]
    PolicyRead {
        /// Path of the policy file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// No domain can be resolved: the policy is broken or has no fallback domain.
    #[error("domain policy unavailable: {0}")]
    PolicyUnavailable(String),
}

/// Result type for capability operations.
pub type CapabilityResult<T> = Result<T, CapabilityError>;
