//! Warden Test - Shared test utilities for the Warden runtime.
//!
//! Mock collaborators and helpers used across the Warden crates as a
//! dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! warden-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use warden_test::{ScriptedDialog, test_security_context};
//! use warden_approval::PromptChoice;
//!
//! #[tokio::test]
//! async fn test_grant() {
//!     let dialog = Arc::new(ScriptedDialog::new().with_answer(PromptChoice::AllowOnce));
//!     let security = test_security_context("untrusted", dialog.clone());
//!     security.check_for_permission(Capability::NetHttp, "").await.unwrap();
//!     assert_eq!(dialog.questions().len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
