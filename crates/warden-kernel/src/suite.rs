//! Suite identity and manifests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use warden_scheduler::AppClassId;

pub use warden_scheduler::SuiteInfo;

use crate::error::{KernelError, KernelResult};

const MAX_SUITE_ID_LEN: usize = 128;

/// Stable identifier of an installed suite.
///
/// Lowercase ASCII letters, digits, `-` and `.`; it doubles as the storage
/// key of the suite's settings record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SuiteId(String);

impl SuiteId {
    /// Validate and wrap an id.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidSuiteId`] if `id` is empty, too long, or
    /// contains anything but lowercase letters, digits, `-` and `.`.
    pub fn new(id: impl Into<String>) -> KernelResult<Self> {
        let id = id.into();
        let invalid = |reason| KernelError::InvalidSuiteId {
            id: id.clone(),
            reason,
        };

        if id.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if id.len() > MAX_SUITE_ID_LEN {
            return Err(invalid("longer than 128 characters"));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        {
            return Err(invalid("only lowercase letters, digits, '-' and '.' are allowed"));
        }
        if id.starts_with('.') || id.ends_with('.') {
            return Err(invalid("must not start or end with '.'"));
        }
        Ok(Self(id))
    }

    /// The id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SuiteId {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SuiteId {
    type Error = KernelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SuiteId> for String {
    fn from(id: SuiteId) -> Self {
        id.0
    }
}

/// What a suite ships: its application classes and which one starts first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteManifest {
    /// Suite id.
    pub id: SuiteId,
    /// Display name shown in permission questions.
    pub name: String,
    /// Every application class in the suite.
    pub classes: Vec<AppClassId>,
    /// Class launched when the user starts the suite.
    pub initial: AppClassId,
}

impl SuiteManifest {
    /// A suite with a single application class.
    #[must_use]
    pub fn new(id: SuiteId, name: impl Into<String>, initial: impl Into<AppClassId>) -> Self {
        let initial = initial.into();
        Self {
            id,
            name: name.into(),
            classes: vec![initial.clone()],
            initial,
        }
    }

    /// Add another application class.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<AppClassId>) -> Self {
        let class = class.into();
        if !self.classes.contains(&class) {
            self.classes.push(class);
        }
        self
    }

    /// Whether `class` belongs to the suite.
    #[must_use]
    pub fn contains(&self, class: &AppClassId) -> bool {
        self.classes.contains(class)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidManifest`] for an empty name or an
    /// initial class missing from the class list.
    pub fn validate(&self) -> KernelResult<()> {
        let invalid = |message: &str| KernelError::InvalidManifest {
            suite: self.id.to_string(),
            message: message.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if !self.contains(&self.initial) {
            return Err(invalid("initial class is not listed in classes"));
        }
        Ok(())
    }

    /// Scheduler-facing description of the suite once bound to `domain`.
    #[must_use]
    pub fn info(&self, domain: impl Into<String>) -> SuiteInfo {
        SuiteInfo::new(self.id.as_str(), self.name.clone(), domain)
    }
}
