//! Questions put to the user and their answers.

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_capabilities::Capability;

/// An answer the user can pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptChoice {
    /// Allow until changed in settings.
    AllowAlways,
    /// Allow for the rest of this run.
    AllowSession,
    /// Allow this one call.
    AllowOnce,
    /// Refuse now, ask again next run.
    DenyAskLater,
    /// Refuse and never ask again.
    DenyNever,
}

impl PromptChoice {
    /// Button label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AllowAlways => "Always allow",
            Self::AllowSession => "Allow while running",
            Self::AllowOnce => "Allow this time",
            Self::DenyAskLater => "Not now",
            Self::DenyNever => "Never",
        }
    }

    /// Whether the choice grants the call.
    #[must_use]
    pub fn is_grant(self) -> bool {
        matches!(self, Self::AllowAlways | Self::AllowSession | Self::AllowOnce)
    }
}

impl fmt::Display for PromptChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What came back from the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogOutcome {
    /// The user picked an option.
    Answered(PromptChoice),
    /// The user dismissed the question.
    Cancelled,
    /// The dialog went away before an answer (the suite is being torn down,
    /// the terminal closed).
    Interrupted,
}

/// A permission question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionQuestion {
    /// Suite id asking.
    pub suite: String,
    /// Capability being requested.
    pub capability: Capability,
    /// Short title.
    pub title: String,
    /// Full question text.
    pub body: String,
    /// Caller-supplied detail (a URL, a file name, a phone number).
    pub subject: String,
    /// Answers the user may pick, most permissive first.
    pub options: Vec<PromptChoice>,
}

impl PermissionQuestion {
    /// Whether `choice` was offered.
    #[must_use]
    pub fn offers(&self, choice: PromptChoice) -> bool {
        self.options.contains(&choice)
    }
}
