//! Warden Approval - the per-suite security context.
//!
//! This crate provides:
//! - [`SecurityContext`]: one suite's permission state and the three checks
//!   suite code makes before a restricted operation
//! - [`PermissionDialog`]: the collaborator that puts questions to the user
//! - [`CapabilityDenied`]: the first-class denial error with its
//!   [`DenialReason`]
//! - Settings changes ([`SecurityContext::set_level`]) bounded by the ceiling
//!   and the auto-invocation exclusivity rule
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_approval::{HeadlessDialog, SecurityContext};
//! use warden_capabilities::{Capability, DomainPolicyStore};
//!
//! # async fn example() -> Result<(), warden_approval::ApprovalError> {
//! let store = DomainPolicyStore::embedded();
//! let ctx = SecurityContext::for_domain(&store, "demo", "Demo", "untrusted", Arc::new(HeadlessDialog))?;
//!
//! ctx.check_for_permission(Capability::NetHttp, "http://example.com").await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod dialog;
mod error;
mod question;
mod settings;

pub use context::{PermissionStatus, SecurityContext};
pub use dialog::{HeadlessDialog, PermissionDialog};
pub use error::{ApprovalError, ApprovalResult, CapabilityDenied, DenialReason};
pub use question::{DialogOutcome, PermissionQuestion, PromptChoice};
