//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_test::prelude::*;` to import all essential types.

pub use crate::{DisplayEvent, RecordingDisplay, ScriptedApp, ScriptedDialog};

pub use crate::{TEST_POLICY, test_policy_store, test_security_context, test_suite_info};

pub use crate::{init_test_logging, test_dir, test_file, wait_until};
