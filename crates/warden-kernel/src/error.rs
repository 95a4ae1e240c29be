//! Kernel error types.

use warden_approval::ApprovalError;
use warden_capabilities::CapabilityError;
use warden_scheduler::{AppClassId, SchedulerError};
use warden_storage::StorageError;

/// Errors from installing, persisting and running suites.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// Suite id failed validation.
    #[error("invalid suite id {id:?}: {reason}")]
    InvalidSuiteId {
        /// The rejected id.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// No suite with this id is installed.
    #[error("suite {0} is not installed")]
    UnknownSuite(String),

    /// A manifest names an application class nobody registered a factory for.
    #[error("suite {suite} uses unknown application class {class}")]
    UnknownAppClass {
        /// Suite being installed or launched.
        suite: String,
        /// The missing class.
        class: AppClassId,
    },

    /// A manifest is inconsistent.
    #[error("invalid manifest for suite {suite}: {message}")]
    InvalidManifest {
        /// Suite id.
        suite: String,
        /// What is wrong.
        message: String,
    },

    /// A stored settings record could not be decoded.
    #[error("corrupt settings record for suite {suite}: {message}")]
    CorruptSettings {
        /// Suite id.
        suite: String,
        /// Decoder message.
        message: String,
    },

    /// Settings do not fit the record format.
    #[error("settings for suite {suite} cannot be encoded: {message}")]
    EncodeSettings {
        /// Suite id.
        suite: String,
        /// What overflowed.
        message: String,
    },

    /// Policy could not be loaded. Suite startup stops here.
    #[error(transparent)]
    Policy(#[from] CapabilityError),

    /// Permission engine error.
    #[error(transparent)]
    Approval(#[from] ApprovalError),

    /// Scheduler misuse.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Storage backend failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Manifest (de)serialization failure.
    #[error("manifest serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
