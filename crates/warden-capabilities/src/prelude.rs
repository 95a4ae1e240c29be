//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_capabilities::prelude::*;` to import all essential types.

// Errors
pub use crate::{CapabilityError, CapabilityResult};

// Capability space
pub use crate::{Capability, CapabilityGroup, PermissionLevel, PermissionVector};

// Policy
pub use crate::{DomainPermissions, DomainPolicyStore, PolicySource};
