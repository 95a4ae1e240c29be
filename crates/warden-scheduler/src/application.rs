//! Applications and the handle they get back from the scheduler.

use std::fmt;
use std::sync::Weak;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::scheduler::Shared;
use crate::state::StateRequest;

/// Stable identifier of an application class.
///
/// Two records with the same class id are instances of the same application;
/// registering a second one tears the first down.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppClassId(String);

impl AppClassId {
    /// Wrap a class name.
    #[must_use]
    pub fn new(class: impl Into<String>) -> Self {
        Self(class.into())
    }

    /// The class name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AppClassId {
    fn from(class: &str) -> Self {
        Self::new(class)
    }
}

/// Identifier of one application record. Never reused within a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub(crate) u64);

impl RecordId {
    /// Raw value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the display and callbacks know about a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppInfo {
    /// Record id.
    pub id: RecordId,
    /// Application class.
    pub class: AppClassId,
}

impl fmt::Display for AppInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class, self.id)
    }
}

/// The suite a scheduler is running.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuiteInfo {
    /// Stable suite id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Resolved trust domain.
    pub domain: String,
}

impl SuiteInfo {
    /// Describe a suite.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            domain: domain.into(),
        }
    }
}

impl fmt::Display for SuiteInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An application the scheduler drives through its lifecycle.
///
/// Callbacks run on the dispatch loop, outside the scheduler lock, so they
/// may freely call back into the scheduler (through the [`AppHandle`]) or
/// wait on a permission question. An error or a panic tears the
/// application down.
#[async_trait]
pub trait Application: Send + Sync {
    /// Entering the foreground (first start or resume).
    async fn start(&self, handle: &AppHandle) -> AppResult<()>;

    /// Going to the background.
    async fn pause(&self, _handle: &AppHandle) -> AppResult<()> {
        Ok(())
    }

    /// Tearing down. The scheduler always passes `unconditional = true`;
    /// the application may not refuse.
    async fn destroy(&self, handle: &AppHandle, unconditional: bool) -> AppResult<()>;
}

/// Handle an application uses to talk to its scheduler.
///
/// Holds only a weak reference: once the scheduler is gone every call is a
/// no-op.
#[derive(Clone)]
pub struct AppHandle {
    info: AppInfo,
    scheduler: Weak<Shared>,
}

impl fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppHandle")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl AppHandle {
    pub(crate) fn new(info: AppInfo, scheduler: Weak<Shared>) -> Self {
        Self { info, scheduler }
    }

    /// This record's id.
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        self.info.id
    }

    /// This record's class.
    #[must_use]
    pub fn class_id(&self) -> &AppClassId {
        &self.info.class
    }

    /// Both.
    #[must_use]
    pub fn info(&self) -> &AppInfo {
        &self.info
    }

    fn request(&self, request: StateRequest) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|shared| shared.request(self.info.id, request).unwrap_or(false))
    }

    /// The application paused itself.
    pub fn notify_paused(&self) -> bool {
        self.request(StateRequest::NotifyPaused)
    }

    /// The application exited on its own. No destroy callback follows.
    pub fn notify_destroyed(&self) -> bool {
        self.request(StateRequest::NotifyDestroyed)
    }

    /// The application wants the foreground back.
    pub fn resume_request(&self) -> bool {
        self.request(StateRequest::ResumeRequest)
    }
}
