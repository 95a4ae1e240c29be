//! Warden Telemetry - Logging and tracing for the Warden runtime supervisor.
//!
//! This crate provides:
//! - Configurable subscriber setup (pretty, compact, JSON; stdout, stderr, rolling files)
//! - [`RunContext`] spans that tie every log line of one suite run or one
//!   interrupt arbitration together
//!
//! # Example
//!
//! ```rust,no_run
//! use warden_telemetry::{LogConfig, LogFormat, RunContext, setup_logging};
//!
//! # fn main() -> Result<(), warden_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("warden_scheduler=debug");
//! setup_logging(&config)?;
//!
//! let ctx = RunContext::new("scheduler").with_suite("demo-suite");
//! let _guard = ctx.span().entered();
//! tracing::info!("suite started");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod context;
mod error;
mod logging;

pub use context::RunContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
