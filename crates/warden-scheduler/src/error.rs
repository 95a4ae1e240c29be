//! Scheduler error types.

use crate::application::RecordId;

/// Errors from scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// `schedule` was called while another suite is being scheduled on the
    /// same scheduler.
    #[error("scheduler is already running suite {running}")]
    AlreadyScheduling {
        /// Suite currently scheduled.
        running: String,
    },

    /// No record with this id is registered.
    #[error("unknown application record {0}")]
    UnknownRecord(RecordId),
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Error returned by an application callback.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The application reported a failure.
    #[error("{0}")]
    Failed(String),

    /// A lower-level error bubbled out of the application.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    /// Failure with a message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Wrap any error.
    #[must_use]
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(error))
    }
}

/// Result type for application callbacks.
pub type AppResult<T> = Result<T, AppError>;
