//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_scheduler::prelude::*;` to import all essential types.

// Errors
pub use crate::{AppError, AppResult, SchedulerError, SchedulerResult};

// Applications
pub use crate::{AppClassId, AppHandle, AppInfo, AppState, Application, RecordId, SuiteInfo};

// Scheduling
pub use crate::{Display, LogDisplay, Scheduler};
