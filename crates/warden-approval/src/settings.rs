//! Changing permission levels from a settings screen.

use tracing::info;
use warden_capabilities::{Capability, PermissionLevel, PermissionVector};

use crate::context::SecurityContext;
use crate::error::{ApprovalError, ApprovalResult};

/// A capability already blanket-granted that would make a blanket grant of
/// `cap` an auto-invocation plus chargeable combination.
pub(crate) fn blanket_conflict(vector: &PermissionVector, cap: Capability) -> Option<Capability> {
    let granted = |c: Capability| vector.current(c) == PermissionLevel::BlanketGranted;

    if cap == Capability::PushRegistry {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.is_chargeable() && granted(*c))
    } else if cap.is_chargeable() && granted(Capability::PushRegistry) {
        Some(Capability::PushRegistry)
    } else {
        None
    }
}

impl SecurityContext {
    /// Levels the user may pick for `cap`, given its ceiling.
    #[must_use]
    pub fn selectable_levels(&self, cap: Capability) -> Vec<PermissionLevel> {
        let ceiling = self.maximum(cap);
        if cap.is_administrative() || ceiling == PermissionLevel::Never {
            return Vec::new();
        }

        let mut levels = Vec::with_capacity(6);
        if ceiling == PermissionLevel::Allow {
            levels.push(PermissionLevel::Allow);
        }
        for level in [
            PermissionLevel::BlanketGranted,
            PermissionLevel::Session,
            PermissionLevel::OneShot,
        ] {
            if ceiling.permits(level) {
                levels.push(level);
            }
        }
        levels.extend([PermissionLevel::Deny, PermissionLevel::UserDenied]);
        levels
    }

    /// Set `cap` to `level` as a user would from the settings screen.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::InvalidSettingsChange`] if the level is above the
    ///   ceiling, not user-selectable, or `cap` is not user-changeable
    /// - [`ApprovalError::MutuallyExclusive`] if a blanket grant would pair
    ///   auto-invocation with a chargeable capability
    pub fn set_level(&self, cap: Capability, level: PermissionLevel) -> ApprovalResult<()> {
        let invalid = |reason: &str| ApprovalError::InvalidSettingsChange {
            capability: cap,
            level,
            reason: reason.to_string(),
        };

        if cap.is_administrative() {
            return Err(invalid("administrative capabilities are not user-changeable"));
        }

        let mut state = self.state();
        let ceiling = state.vector.maximum(cap);
        if ceiling == PermissionLevel::Never {
            return Err(invalid("the suite's domain never grants it"));
        }

        let allowed = match level {
            PermissionLevel::Allow => ceiling == PermissionLevel::Allow,
            PermissionLevel::BlanketGranted
            | PermissionLevel::Session
            | PermissionLevel::OneShot => ceiling.permits(level),
            PermissionLevel::Deny | PermissionLevel::UserDenied => true,
            PermissionLevel::Never | PermissionLevel::Blanket | PermissionLevel::DenySession => {
                return Err(invalid("not a selectable level"));
            },
        };
        if !allowed {
            return Err(invalid(&format!("the ceiling is {ceiling}")));
        }

        if level == PermissionLevel::BlanketGranted
            && let Some(conflicting) = blanket_conflict(&state.vector, cap)
        {
            return Err(ApprovalError::MutuallyExclusive {
                requested: cap,
                conflicting,
            });
        }

        state.set(cap, level);
        drop(state);
        info!(
            suite = %self.suite_id(),
            capability = %cap,
            %level,
            "Permission level changed"
        );
        Ok(())
    }
}
