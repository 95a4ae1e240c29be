//! Permission levels.
//!
//! A level is both a live authorization state (`current[]`) and a ceiling
//! (`maximum[]`). The variants carry no arithmetic meaning; the persistence
//! byte of each variant is fixed explicitly in [`PermissionLevel::to_byte`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CapabilityError, CapabilityResult};

/// Authorization level of one capability for one suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// Not available to this suite at all.
    #[default]
    Never,
    /// Always granted without asking.
    Allow,
    /// The user granted a blanket permission. Stable until changed in settings.
    BlanketGranted,
    /// Ask; the user may grant a blanket permission.
    Blanket,
    /// Ask once per run.
    Session,
    /// Ask on every use.
    OneShot,
    /// Denied for the current run; asked again on the next run.
    DenySession,
    /// Not allowed, but the user is asked on use.
    Deny,
    /// The user said no. Stable until changed in settings.
    UserDenied,
}

impl PermissionLevel {
    /// Persistence byte of this level.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Never => 0x00,
            Self::Allow => 0x01,
            Self::BlanketGranted => 0x02,
            Self::Blanket => 0x04,
            Self::Session => 0x08,
            Self::OneShot => 0x10,
            Self::DenySession => 0x20,
            Self::Deny => 0x40,
            Self::UserDenied => 0x80,
        }
    }

    /// Decode a persistence byte.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::InvalidLevel`] for unknown bytes.
    pub fn from_byte(byte: u8) -> CapabilityResult<Self> {
        Ok(match byte {
            0x00 => Self::Never,
            0x01 => Self::Allow,
            0x02 => Self::BlanketGranted,
            0x04 => Self::Blanket,
            0x08 => Self::Session,
            0x10 => Self::OneShot,
            0x20 => Self::DenySession,
            0x40 => Self::Deny,
            0x80 => Self::UserDenied,
            other => return Err(CapabilityError::InvalidLevel(other)),
        })
    }

    /// Decided-and-stable levels need no user interaction.
    #[must_use]
    pub fn is_decided(self) -> bool {
        matches!(self, Self::Allow | Self::BlanketGranted | Self::UserDenied)
    }

    /// Position of a ceiling on the escalation ladder.
    ///
    /// `OneShot < Session < Blanket < Allow`. Every other level offers no
    /// grant at all and has no rank.
    #[must_use]
    pub fn grant_rank(self) -> Option<u8> {
        match self {
            Self::OneShot => Some(1),
            Self::Session => Some(2),
            Self::Blanket => Some(3),
            Self::Allow => Some(4),
            _ => None,
        }
    }

    /// Whether a ceiling of `self` permits the user to grant at least `level`.
    #[must_use]
    pub fn permits(self, level: Self) -> bool {
        let ceiling = self.grant_rank();
        // A granted blanket needs a blanket ceiling.
        let wanted = match level {
            Self::BlanketGranted => Self::Blanket.grant_rank(),
            other => other.grant_rank(),
        };
        match (ceiling, wanted) {
            (Some(c), Some(w)) => w <= c,
            _ => false,
        }
    }

    /// Parse a ceiling keyword of the policy language.
    #[must_use]
    pub fn from_policy_ceiling(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "allow" => Some(Self::Allow),
            "blanket" => Some(Self::Blanket),
            "session" => Some(Self::Session),
            "oneshot" => Some(Self::OneShot),
            _ => None,
        }
    }

    /// Parse a default-level keyword of the policy language.
    #[must_use]
    pub fn from_policy_default(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "blanket" => Some(Self::Blanket),
            "session" => Some(Self::Session),
            "oneshot" => Some(Self::OneShot),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }

    /// Short lowercase label for display.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Allow => "allow",
            Self::BlanketGranted => "blanket-granted",
            Self::Blanket => "blanket",
            Self::Session => "session",
            Self::OneShot => "oneshot",
            Self::DenySession => "deny-session",
            Self::Deny => "deny",
            Self::UserDenied => "user-denied",
        }
    }

    /// Parse a [`label`](Self::label).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        [
            Self::Never,
            Self::Allow,
            Self::BlanketGranted,
            Self::Blanket,
            Self::Session,
            Self::OneShot,
            Self::DenySession,
            Self::Deny,
            Self::UserDenied,
        ]
        .into_iter()
        .find(|level| level.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PermissionLevel; 9] = [
        PermissionLevel::Never,
        PermissionLevel::Allow,
        PermissionLevel::BlanketGranted,
        PermissionLevel::Blanket,
        PermissionLevel::Session,
        PermissionLevel::OneShot,
        PermissionLevel::DenySession,
        PermissionLevel::Deny,
        PermissionLevel::UserDenied,
    ];

    #[test]
    fn test_bytes_are_distinct_and_decodable() {
        let mut seen = std::collections::HashSet::new();
        for level in ALL {
            assert!(seen.insert(level.to_byte()));
            assert_eq!(PermissionLevel::from_byte(level.to_byte()).unwrap(), level);
        }
        assert!(matches!(
            PermissionLevel::from_byte(0x03),
            Err(CapabilityError::InvalidLevel(0x03))
        ));
    }

    #[test]
    fn test_decided_levels() {
        let decided: Vec<_> = ALL.into_iter().filter(|l| l.is_decided()).collect();
        assert_eq!(
            decided,
            vec![
                PermissionLevel::Allow,
                PermissionLevel::BlanketGranted,
                PermissionLevel::UserDenied
            ]
        );
    }

    #[test]
    fn test_ceiling_permits() {
        use PermissionLevel::*;
        assert!(Blanket.permits(BlanketGranted));
        assert!(Blanket.permits(Session));
        assert!(Session.permits(OneShot));
        assert!(!Session.permits(BlanketGranted));
        assert!(!OneShot.permits(Session));
        assert!(Allow.permits(Allow));
        assert!(!Blanket.permits(Allow));
        assert!(!Never.permits(OneShot));
    }

    #[test]
    fn test_policy_keywords() {
        assert_eq!(
            PermissionLevel::from_policy_ceiling("BLANKET"),
            Some(PermissionLevel::Blanket)
        );
        assert_eq!(PermissionLevel::from_policy_ceiling("deny"), None);
        assert_eq!(
            PermissionLevel::from_policy_default("deny"),
            Some(PermissionLevel::Deny)
        );
        assert_eq!(PermissionLevel::from_policy_default("allow"), None);
    }

    #[test]
    fn test_labels() {
        for level in ALL {
            assert_eq!(PermissionLevel::from_label(level.label()), Some(level));
        }
        assert_eq!(PermissionLevel::from_label("sometimes"), None);
    }
}
