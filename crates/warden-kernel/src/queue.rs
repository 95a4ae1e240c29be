//! Launch queue for the host command loop.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_scheduler::AppClassId;

use crate::suite::SuiteId;

/// Why a suite is being launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LaunchReason {
    /// The user started it.
    User,
    /// Inbound data arrived on a registered connection.
    InboundData {
        /// Connection the data arrived on.
        connection: String,
    },
    /// A registered alarm fired.
    Alarm,
}

impl fmt::Display for LaunchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::InboundData { connection } => write!(f, "inbound data on {connection}"),
            Self::Alarm => f.write_str("alarm"),
        }
    }
}

/// One queued launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    /// Suite to schedule.
    pub suite: SuiteId,
    /// Class to start; `None` means the manifest's initial class.
    pub app_class: Option<AppClassId>,
    /// Why.
    pub reason: LaunchReason,
}

impl LaunchRequest {
    /// The user starts `suite` at its initial class.
    #[must_use]
    pub fn user(suite: SuiteId) -> Self {
        Self {
            suite,
            app_class: None,
            reason: LaunchReason::User,
        }
    }
}

/// FIFO of launches waiting for the scheduler.
#[derive(Debug, Default)]
pub struct SuiteQueue {
    pending: Mutex<VecDeque<LaunchRequest>>,
}

impl SuiteQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LaunchRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a launch.
    pub fn push(&self, request: LaunchRequest) {
        debug!(suite = %request.suite, reason = %request.reason, "Launch queued");
        self.lock().push_back(request);
    }

    /// Take the oldest launch.
    pub fn pop(&self) -> Option<LaunchRequest> {
        self.lock().pop_front()
    }

    /// Oldest launch, left in place.
    #[must_use]
    pub fn peek(&self) -> Option<LaunchRequest> {
        self.lock().front().cloned()
    }

    /// Number of queued launches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every queued launch. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut pending = self.lock();
        let dropped = pending.len();
        pending.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SuiteId {
        SuiteId::new(s).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let queue = SuiteQueue::new();
        queue.push(LaunchRequest::user(id("a")));
        queue.push(LaunchRequest {
            suite: id("b"),
            app_class: Some("inbox".into()),
            reason: LaunchReason::InboundData {
                connection: "sms://:5000".to_string(),
            },
        });

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek().unwrap().suite, id("a"));
        assert_eq!(queue.pop().unwrap().suite, id("a"));
        let next = queue.pop().unwrap();
        assert_eq!(next.app_class, Some(AppClassId::from("inbox")));
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_clear() {
        let queue = SuiteQueue::new();
        queue.push(LaunchRequest::user(id("a")));
        queue.push(LaunchRequest::user(id("b")));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reason_display() {
        let reason = LaunchReason::InboundData {
            connection: "datagram://:7000".to_string(),
        };
        assert_eq!(reason.to_string(), "inbound data on datagram://:7000");
        assert_eq!(LaunchReason::Alarm.to_string(), "alarm");
    }
}
