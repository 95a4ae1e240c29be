#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::module_name_repetitions)]

//! Warden Kernel - runs installed suites on the scheduler.
//!
//! The kernel ties the lifecycle scheduler to the permission engine:
//!
//! - **Suites**: validated ids and manifests naming each suite's classes
//! - **Settings**: the persisted permission record of every installed suite
//! - **Factories**: class id to constructor, resolved at install time
//! - **Queue**: launches waiting for the scheduler
//! - **Arbitration**: whether an inbound event may interrupt the running suite
//! - **Host**: the command loop running one suite after another
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use warden_kernel::prelude::*;
//! use warden_scheduler::{AppHandle, AppResult, Application};
//!
//! struct Hello;
//!
//! #[async_trait::async_trait]
//! impl Application for Hello {
//!     async fn start(&self, handle: &AppHandle) -> AppResult<()> {
//!         handle.notify_destroyed();
//!         Ok(())
//!     }
//!
//!     async fn destroy(&self, _handle: &AppHandle, _unconditional: bool) -> AppResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> KernelResult<()> {
//! let apps = AppRegistry::new().with("hello", |_| Arc::new(Hello) as Arc<dyn Application>);
//! let host = Host::builder(apps).build()?;
//!
//! let id = SuiteId::new("hello")?;
//! host.install_suite(&SuiteManifest::new(id.clone(), "Hello", "hello"), "untrusted", false)
//!     .await?;
//! let exit = host.run(LaunchRequest::user(id)).await?;
//! assert_eq!(exit, HostExit::Completed);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

mod arbiter;
mod error;
mod factory;
mod host;
mod queue;
mod settings;
mod suite;

pub use arbiter::{
    ArbitrationOutcome, DiscardingPushRegistry, InterruptArbiter, InterruptEvent, PushRegistry,
    RunningSuite,
};
pub use error::{KernelError, KernelResult};
pub use factory::{AppFactory, AppRegistry, LaunchContext};
pub use host::{Host, HostBuilder, HostExit, MANIFEST_NAMESPACE, open_store, policy_store};
pub use queue::{LaunchReason, LaunchRequest, SuiteQueue};
pub use settings::{SETTINGS_NAMESPACE, SettingsStore, SuiteSettings};
pub use suite::{SuiteId, SuiteInfo, SuiteManifest};
