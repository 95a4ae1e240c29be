//! The display collaborator.

use async_trait::async_trait;

use crate::application::AppInfo;

/// Puts applications on and off the screen.
///
/// Called only from the dispatch loop, outside the scheduler lock.
#[async_trait]
pub trait Display: Send + Sync {
    /// `app` became the foreground application.
    async fn activate(&self, app: &AppInfo);

    /// `app` is no longer in the foreground.
    async fn deactivate(&self, app: &AppInfo);

    /// Nothing is left to show.
    async fn clear(&self);
}

/// A display that only logs. For headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDisplay;

#[async_trait]
impl Display for LogDisplay {
    async fn activate(&self, app: &AppInfo) {
        tracing::info!(app = %app, "Foreground");
    }

    async fn deactivate(&self, app: &AppInfo) {
        tracing::debug!(app = %app, "Background");
    }

    async fn clear(&self) {
        tracing::debug!("Display cleared");
    }
}
