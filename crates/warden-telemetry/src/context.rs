//! Run context for correlating log lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one unit of supervisor work: a suite run, a prompt, an
/// interrupt arbitration.
///
/// Child contexts share the parent's `correlation_id`, so every line logged
/// while one suite runs can be grepped out of a busy log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    /// Unique id of this unit.
    pub run_id: Uuid,
    /// Shared by a context and all its children.
    pub correlation_id: Uuid,
    /// Parent run, for children.
    pub parent_id: Option<Uuid>,
    /// Component that created the context.
    pub source: String,
    /// Suite the work belongs to.
    pub suite: Option<String>,
    /// Operation name.
    pub operation: Option<String>,
    /// Creation time.
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    /// Fresh root context.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        Self {
            run_id: id,
            correlation_id: id,
            parent_id: None,
            source: source.into(),
            suite: None,
            operation: None,
            started_at: Utc::now(),
        }
    }

    /// Child context sharing this context's correlation id and suite.
    #[must_use]
    pub fn child(&self, source: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            correlation_id: self.correlation_id,
            parent_id: Some(self.run_id),
            source: source.into(),
            suite: self.suite.clone(),
            operation: None,
            started_at: Utc::now(),
        }
    }

    /// Attach a suite id.
    #[must_use]
    pub fn with_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }

    /// Attach an operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Milliseconds since creation.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
    }

    /// First eight hex digits of the run id.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.run_id.simple().to_string().chars().take(8).collect()
    }

    /// Span carrying this context's fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "run",
            run_id = %self.short_id(),
            correlation_id = %self.correlation_id,
            source = %self.source,
            suite = self.suite.as_deref(),
            operation = self.operation.as_deref(),
        )
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}
