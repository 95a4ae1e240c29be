//! Warden Scheduler - application lifecycle scheduling.
//!
//! A [`Scheduler`] runs the applications of one suite at a time. Each
//! registered [`Application`] gets a record whose [`AppState`] moves
//! through a small priority-ordered state machine; a single dispatch loop
//! carries out pending transitions and calls the application's lifecycle
//! callbacks.
//!
//! # Guarantees
//!
//! - At most one record is `Active` at any time.
//! - `Destroyed` is terminal; a destroyed record is never revived.
//! - Callbacks run outside the scheduler lock; an error or panic in a
//!   callback tears that application down and nothing else.
//! - [`Scheduler::schedule`] returns `false` only when the run ended
//!   through [`Scheduler::shutdown`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_scheduler::{
//!     AppHandle, AppResult, Application, LogDisplay, Scheduler, SuiteInfo,
//! };
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
//! # async fn run() -> Result<(), warden_scheduler::SchedulerError> {
//! let scheduler = Scheduler::new(Arc::new(LogDisplay));
//! scheduler.register(Arc::new(Hello), "hello".into());
//! let exited_normally = scheduler
//!     .schedule(&SuiteInfo::new("demo", "Demo", "untrusted"))
//!     .await?;
//! assert!(exited_normally);
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

mod application;
mod display;
mod error;
mod record;
mod scheduler;
mod state;

pub use application::{AppClassId, AppHandle, AppInfo, Application, RecordId, SuiteInfo};
pub use display::{Display, LogDisplay};
pub use error::{AppError, AppResult, SchedulerError, SchedulerResult};
pub use scheduler::Scheduler;
pub use state::AppState;
