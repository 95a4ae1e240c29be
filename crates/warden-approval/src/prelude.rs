//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_approval::prelude::*;` to import all essential types.

// Errors
pub use crate::{ApprovalError, ApprovalResult, CapabilityDenied, DenialReason};

// Context
pub use crate::{PermissionStatus, SecurityContext};

// Dialog
pub use crate::{DialogOutcome, HeadlessDialog, PermissionDialog, PermissionQuestion, PromptChoice};
