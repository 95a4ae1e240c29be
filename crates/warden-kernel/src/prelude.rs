//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_kernel::prelude::*;` to import all essential types.

// Errors
pub use crate::{KernelError, KernelResult};

// Suites and settings
pub use crate::{SettingsStore, SuiteId, SuiteInfo, SuiteManifest, SuiteSettings};

// Launching
pub use crate::{AppRegistry, LaunchContext, LaunchReason, LaunchRequest, SuiteQueue};

// Arbitration
pub use crate::{ArbitrationOutcome, InterruptArbiter, InterruptEvent, PushRegistry};

// Host
pub use crate::{Host, HostBuilder, HostExit};
