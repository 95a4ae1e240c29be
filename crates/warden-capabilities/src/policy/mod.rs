//! Trust-domain policy.
//!
//! A policy is a set of named domains. Each domain fixes a ceiling and a
//! default level per capability. See [`parser`] for the text format and
//! [`DomainPolicyStore`] for how lookups are resolved.

use std::collections::HashMap;

use crate::capability::Capability;
use crate::level::PermissionLevel;

pub mod parser;
mod store;

pub use parser::parse;
pub use store::{DomainPolicyStore, PolicySource};

/// The hard-wired domain in which everything is allowed.
pub const INTERNAL_DOMAIN: &str = "internal";

/// The domain unknown or absent domain names resolve to.
pub const FALLBACK_DOMAIN: &str = "untrusted";

/// Ceiling and default level of every capability in one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPermissions {
    name: String,
    maximum: [PermissionLevel; Capability::COUNT],
    default: [PermissionLevel; Capability::COUNT],
}

impl DomainPermissions {
    /// A domain that permits nothing.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            maximum: [PermissionLevel::Never; Capability::COUNT],
            default: [PermissionLevel::Never; Capability::COUNT],
        }
    }

    /// The internal domain: every capability `Allow`.
    #[must_use]
    pub fn internal() -> Self {
        Self {
            name: INTERNAL_DOMAIN.to_string(),
            maximum: [PermissionLevel::Allow; Capability::COUNT],
            default: [PermissionLevel::Allow; Capability::COUNT],
        }
    }

    /// Domain name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ceiling for `cap`.
    #[must_use]
    pub fn maximum(&self, cap: Capability) -> PermissionLevel {
        self.maximum[cap.index()]
    }

    /// Default level for `cap`.
    #[must_use]
    pub fn default_level(&self, cap: Capability) -> PermissionLevel {
        self.default[cap.index()]
    }

    /// All ceilings.
    #[must_use]
    pub fn maximum_levels(&self) -> &[PermissionLevel; Capability::COUNT] {
        &self.maximum
    }

    /// All defaults.
    #[must_use]
    pub fn default_levels(&self) -> &[PermissionLevel; Capability::COUNT] {
        &self.default
    }

    pub(crate) fn set(&mut self, cap: Capability, maximum: PermissionLevel, default: PermissionLevel) {
        self.maximum[cap.index()] = maximum;
        self.default[cap.index()] = default;
    }
}

/// A fully parsed policy: every domain it defines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTable {
    domains: HashMap<String, DomainPermissions>,
}

impl PolicyTable {
    /// Domain by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DomainPermissions> {
        self.domains.get(name)
    }

    /// Defined domain names, sorted.
    #[must_use]
    pub fn domain_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.domains.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of defined domains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Whether no domain is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.domains.contains_key(name)
    }

    pub(crate) fn insert(&mut self, domain: DomainPermissions) {
        self.domains.insert(domain.name.clone(), domain);
    }
}
