//! Application lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of one application record.
///
/// Variants are declared in ascending scheduling priority: the dispatch
/// loop always services the record whose state has the highest priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// Running in the background; nothing to do.
    Paused,
    /// In the foreground; nothing to do.
    Active,
    /// Freshly registered, wants to be activated.
    PausedResume,
    /// Asked to come back to the foreground.
    ActivePending,
    /// Asked to go to the background.
    PausePending,
    /// Asked to tear down.
    DestroyPending,
    /// Gone. Terminal.
    Destroyed,
}

/// A state-change request from outside the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StateRequest {
    Pause,
    ResumeRequest,
    Destroy,
    NotifyPaused,
    NotifyDestroyed,
}

impl AppState {
    /// Scheduling priority; higher is serviced first.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::Paused => 0,
            Self::Active => 1,
            Self::PausedResume => 2,
            Self::ActivePending => 3,
            Self::PausePending => 4,
            Self::DestroyPending => 5,
            Self::Destroyed => 6,
        }
    }

    /// Nothing pending: the dispatch loop idles when the best state is stable.
    #[must_use]
    pub fn is_stable(self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }

    /// A pending transition the dispatch loop must carry out.
    #[must_use]
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            Self::PausedResume | Self::ActivePending | Self::PausePending | Self::DestroyPending
        )
    }

    /// Absorbing.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Destroyed
    }

    /// State a transitional state resolves to.
    #[must_use]
    pub fn resolve(self) -> Option<Self> {
        match self {
            Self::PausedResume | Self::ActivePending => Some(Self::Active),
            Self::PausePending => Some(Self::Paused),
            Self::DestroyPending => Some(Self::Destroyed),
            Self::Paused | Self::Active | Self::Destroyed => None,
        }
    }

    /// Target of `request` from this state, or `None` when the request makes
    /// no sense here and must be ignored.
    pub(crate) fn on_request(self, request: StateRequest) -> Option<Self> {
        match (request, self) {
            (StateRequest::Pause, Self::Active) => Some(Self::PausePending),
            (StateRequest::ResumeRequest, Self::Paused) => Some(Self::ActivePending),
            (StateRequest::Destroy, s) if !s.is_terminal() && s != Self::DestroyPending => {
                Some(Self::DestroyPending)
            },
            (
                StateRequest::NotifyPaused,
                Self::Active | Self::PausePending | Self::ActivePending | Self::PausedResume,
            ) => Some(Self::Paused),
            (StateRequest::NotifyDestroyed, s) if !s.is_terminal() => Some(Self::Destroyed),
            _ => None,
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Paused => "paused",
            Self::Active => "active",
            Self::PausedResume => "paused-resume",
            Self::ActivePending => "active-pending",
            Self::PausePending => "pause-pending",
            Self::DestroyPending => "destroy-pending",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AppState; 7] = [
        AppState::Paused,
        AppState::Active,
        AppState::PausedResume,
        AppState::ActivePending,
        AppState::PausePending,
        AppState::DestroyPending,
        AppState::Destroyed,
    ];

    #[test]
    fn test_priority_order() {
        for pair in ALL.windows(2) {
            assert!(pair[0].priority() < pair[1].priority());
        }
    }

    #[test]
    fn test_stable_and_transitional_partition() {
        for state in ALL {
            let kinds = [state.is_stable(), state.is_transitional(), state.is_terminal()];
            assert_eq!(kinds.iter().filter(|k| **k).count(), 1, "{state}");
            assert_eq!(state.resolve().is_some(), state.is_transitional());
        }
    }

    #[test]
    fn test_destroyed_is_absorbing() {
        for request in [
            StateRequest::Pause,
            StateRequest::ResumeRequest,
            StateRequest::Destroy,
            StateRequest::NotifyPaused,
            StateRequest::NotifyDestroyed,
        ] {
            assert_eq!(AppState::Destroyed.on_request(request), None);
        }
    }

    #[test]
    fn test_nonsense_requests_are_ignored() {
        assert_eq!(AppState::Paused.on_request(StateRequest::Pause), None);
        assert_eq!(AppState::Active.on_request(StateRequest::ResumeRequest), None);
        assert_eq!(AppState::DestroyPending.on_request(StateRequest::Destroy), None);
        assert_eq!(AppState::Paused.on_request(StateRequest::NotifyPaused), None);
    }

    #[test]
    fn test_request_table() {
        assert_eq!(
            AppState::Active.on_request(StateRequest::Pause),
            Some(AppState::PausePending)
        );
        assert_eq!(
            AppState::Paused.on_request(StateRequest::ResumeRequest),
            Some(AppState::ActivePending)
        );
        assert_eq!(
            AppState::PausedResume.on_request(StateRequest::NotifyPaused),
            Some(AppState::Paused)
        );
        assert_eq!(
            AppState::DestroyPending.on_request(StateRequest::NotifyDestroyed),
            Some(AppState::Destroyed)
        );
    }
}
