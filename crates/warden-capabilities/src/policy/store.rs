//! Lazily built, process-lifetime domain policy cache.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::error::{CapabilityError, CapabilityResult};
use crate::policy::{DomainPermissions, FALLBACK_DOMAIN, INTERNAL_DOMAIN, PolicyTable, parser};

/// Policy shipped with the runtime, used when no policy file is configured.
const DEFAULT_POLICY: &str = include_str!("default_policy.txt");

/// Where the policy text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    /// The policy compiled into the runtime.
    Embedded,
    /// Literal policy text.
    Text(String),
    /// A policy file, read on every load attempt.
    File(PathBuf),
}

impl PolicySource {
    fn read(&self) -> CapabilityResult<String> {
        match self {
            Self::Embedded => Ok(DEFAULT_POLICY.to_string()),
            Self::Text(text) => Ok(text.clone()),
            Self::File(path) => {
                std::fs::read_to_string(path).map_err(|source| CapabilityError::PolicyRead {
                    path: path.display().to_string(),
                    source,
                })
            },
        }
    }
}

/// Maps trust-domain names to their permissions.
///
/// The policy is parsed on first use. A successful parse is cached and never
/// changes afterwards (until [`reload`](Self::reload)). A failed parse caches
/// nothing, so the next lookup reads and parses the source again.
///
/// # Example
///
/// ```
/// use warden_capabilities::{Capability, DomainPolicyStore, PermissionLevel};
///
/// let store = DomainPolicyStore::embedded();
/// let internal = store.for_domain("internal").unwrap();
/// assert_eq!(internal.maximum(Capability::SystemAms), PermissionLevel::Allow);
/// ```
#[derive(Debug)]
pub struct DomainPolicyStore {
    source: PolicySource,
    fallback: String,
    cache: RwLock<Option<Arc<PolicyTable>>>,
}

impl DomainPolicyStore {
    /// Create a store over `source` with the default fallback domain.
    #[must_use]
    pub fn new(source: PolicySource) -> Self {
        Self {
            source,
            fallback: FALLBACK_DOMAIN.to_string(),
            cache: RwLock::new(None),
        }
    }

    /// Store over the embedded default policy.
    #[must_use]
    pub fn embedded() -> Self {
        Self::new(PolicySource::Embedded)
    }

    /// Store over literal policy text.
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(PolicySource::Text(text.into()))
    }

    /// Store over a policy file.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(PolicySource::File(path.into()))
    }

    /// Override the domain unknown names resolve to.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// The policy source.
    #[must_use]
    pub fn source(&self) -> &PolicySource {
        &self.source
    }

    /// The fallback domain name.
    #[must_use]
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Whether a parsed policy is cached.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Return the cached table, parsing the source if nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns the read or parse error. Nothing is cached in that case.
    pub fn load(&self) -> CapabilityResult<Arc<PolicyTable>> {
        if let Some(table) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(table));
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have won the race for the write lock.
        if let Some(table) = cache.as_ref() {
            return Ok(Arc::clone(table));
        }

        let text = self.source.read()?;
        match parser::parse(&text) {
            Ok(table) => {
                info!(domains = table.len(), "Loaded domain policy");
                let table = Arc::new(table);
                *cache = Some(Arc::clone(&table));
                Ok(table)
            },
            Err(e) => {
                warn!(error = %e, "Domain policy rejected; no domain can be resolved");
                Err(e)
            },
        }
    }

    /// Drop the cached policy so the next lookup re-reads the source.
    pub fn reload(&self) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Look up a domain by exact name, without fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy cannot be loaded.
    pub fn lookup(&self, name: &str) -> CapabilityResult<Option<DomainPermissions>> {
        Ok(self.load()?.get(name).cloned())
    }

    /// Names of every domain in the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy cannot be loaded.
    pub fn domain_names(&self) -> CapabilityResult<Vec<String>> {
        Ok(self.load()?.domain_names())
    }

    /// Resolve the permissions for a suite bound to `name`.
    ///
    /// `internal` is hard-wired to all-`Allow` and never touches the policy.
    /// Any other name not present in the policy resolves to the fallback
    /// domain.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::PolicyUnavailable`] when the policy cannot
    /// be loaded or does not define the fallback domain. This is fatal for
    /// suite startup.
    pub fn for_domain(&self, name: &str) -> CapabilityResult<DomainPermissions> {
        if name == INTERNAL_DOMAIN {
            return Ok(DomainPermissions::internal());
        }

        let table = self
            .load()
            .map_err(|e| CapabilityError::PolicyUnavailable(e.to_string()))?;

        if let Some(domain) = table.get(name) {
            debug!(domain = name, "Resolved domain");
            return Ok(domain.clone());
        }

        debug!(
            requested = name,
            fallback = %self.fallback,
            "Unknown domain; using fallback"
        );
        table.get(&self.fallback).cloned().ok_or_else(|| {
            CapabilityError::PolicyUnavailable(format!(
                "fallback domain `{}` is not defined",
                self.fallback
            ))
        })
    }
}

impl Default for DomainPolicyStore {
    fn default() -> Self {
        Self::embedded()
    }
}
