//! Per-suite permission state.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::capability::Capability;
use crate::level::PermissionLevel;
use crate::policy::DomainPermissions;

/// The `maximum[]`, `current[]` and `asked[]` arrays of one suite.
///
/// Indexed by [`Capability::index`]. The vector itself does no locking; the
/// security context that owns it serializes every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionVector {
    maximum: [PermissionLevel; Capability::COUNT],
    current: [PermissionLevel; Capability::COUNT],
    #[serde(skip)]
    asked: [bool; Capability::COUNT],
}

impl PermissionVector {
    /// A vector in which nothing is permitted.
    #[must_use]
    pub fn denied() -> Self {
        Self {
            maximum: [PermissionLevel::Never; Capability::COUNT],
            current: [PermissionLevel::Never; Capability::COUNT],
            asked: [false; Capability::COUNT],
        }
    }

    /// A vector in which everything is `Allow` (the internal domain).
    #[must_use]
    pub fn all_allowed() -> Self {
        Self {
            maximum: [PermissionLevel::Allow; Capability::COUNT],
            current: [PermissionLevel::Allow; Capability::COUNT],
            asked: [false; Capability::COUNT],
        }
    }

    /// Fresh vector for a newly installed suite: ceilings and defaults
    /// taken from its domain.
    #[must_use]
    pub fn from_domain(domain: &DomainPermissions) -> Self {
        Self {
            maximum: *domain.maximum_levels(),
            current: *domain.default_levels(),
            asked: [false; Capability::COUNT],
        }
    }

    /// Rebuild a vector from persisted arrays.
    ///
    /// Arrays written by an older build may be shorter than the current
    /// capability space; missing entries become `Never`. Extra entries are
    /// dropped.
    #[must_use]
    pub fn from_levels(current: &[PermissionLevel], maximum: &[PermissionLevel]) -> Self {
        if current.len() != Capability::COUNT || maximum.len() != Capability::COUNT {
            warn!(
                current_len = current.len(),
                maximum_len = maximum.len(),
                expected = Capability::COUNT,
                "Persisted permission arrays have unexpected length; padding with never"
            );
        }
        let mut vector = Self::denied();
        for (slot, level) in vector.current.iter_mut().zip(current) {
            *slot = *level;
        }
        for (slot, level) in vector.maximum.iter_mut().zip(maximum) {
            *slot = *level;
        }
        vector
    }

    /// Live authorization level.
    #[must_use]
    pub fn current(&self, cap: Capability) -> PermissionLevel {
        self.current[cap.index()]
    }

    /// Ceiling the user may grant up to.
    #[must_use]
    pub fn maximum(&self, cap: Capability) -> PermissionLevel {
        self.maximum[cap.index()]
    }

    /// Replace the live level.
    pub fn set_current(&mut self, cap: Capability, level: PermissionLevel) {
        self.current[cap.index()] = level;
    }

    /// Whether a session-scoped question was already posed this run.
    #[must_use]
    pub fn is_asked(&self, cap: Capability) -> bool {
        self.asked[cap.index()]
    }

    /// Record that the question for `cap` was posed this run.
    pub fn mark_asked(&mut self, cap: Capability) {
        self.asked[cap.index()] = true;
    }

    /// Forget every session-scoped answer. Called at the start of a run.
    pub fn reset_session(&mut self) {
        self.asked = [false; Capability::COUNT];
    }

    /// The `current[]` array.
    #[must_use]
    pub fn current_levels(&self) -> &[PermissionLevel; Capability::COUNT] {
        &self.current
    }

    /// The `maximum[]` array.
    #[must_use]
    pub fn maximum_levels(&self) -> &[PermissionLevel; Capability::COUNT] {
        &self.maximum
    }
}

impl Default for PermissionVector {
    fn default() -> Self {
        Self::denied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_levels_pads_short_arrays() {
        let current = [PermissionLevel::Allow, PermissionLevel::Session];
        let maximum = [PermissionLevel::Allow, PermissionLevel::Blanket];
        let vector = PermissionVector::from_levels(&current, &maximum);

        assert_eq!(vector.current(Capability::SystemAms), PermissionLevel::Session);
        assert_eq!(vector.maximum(Capability::SystemAms), PermissionLevel::Blanket);
        assert_eq!(vector.current(Capability::NetHttp), PermissionLevel::Never);
        assert_eq!(vector.maximum(Capability::MediaRecord), PermissionLevel::Never);
    }

    #[test]
    fn test_from_levels_truncates_long_arrays() {
        let long = vec![PermissionLevel::OneShot; Capability::COUNT.saturating_add(3)];
        let vector = PermissionVector::from_levels(&long, &long);
        assert!(
            vector
                .current_levels()
                .iter()
                .all(|l| *l == PermissionLevel::OneShot)
        );
    }

    #[test]
    fn test_asked_flags_reset() {
        let mut vector = PermissionVector::all_allowed();
        vector.mark_asked(Capability::FileRead);
        assert!(vector.is_asked(Capability::FileRead));
        assert!(!vector.is_asked(Capability::FileWrite));

        vector.reset_session();
        assert!(!vector.is_asked(Capability::FileRead));
    }

    #[test]
    fn test_asked_flags_not_serialized() {
        let mut vector = PermissionVector::denied();
        vector.set_current(Capability::NetHttp, PermissionLevel::Session);
        vector.mark_asked(Capability::NetHttp);

        let json = serde_json::to_string(&vector).unwrap();
        let back: PermissionVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back.current(Capability::NetHttp), PermissionLevel::Session);
        assert!(!back.is_asked(Capability::NetHttp));
    }
}
