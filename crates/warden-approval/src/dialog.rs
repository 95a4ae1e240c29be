//! The dialog collaborator.

use async_trait::async_trait;

use crate::question::{DialogOutcome, PermissionQuestion};

/// Presents permission questions to the user.
///
/// Different hosts (terminal, GUI shell, headless service) implement this
/// trait. `ask` may take as long as the user does; the security context
/// never holds its decision lock across it.
///
/// # Example
///
/// ```rust,ignore
/// use warden_approval::{DialogOutcome, PermissionDialog, PermissionQuestion, PromptChoice};
///
/// struct AlwaysOnce;
///
/// #[async_trait::async_trait]
/// impl PermissionDialog for AlwaysOnce {
///     async fn ask(&self, _question: PermissionQuestion) -> DialogOutcome {
///         DialogOutcome::Answered(PromptChoice::AllowOnce)
///     }
/// }
/// ```
#[async_trait]
pub trait PermissionDialog: Send + Sync {
    /// Show `question` and wait for the user.
    async fn ask(&self, question: PermissionQuestion) -> DialogOutcome;
}

/// Dialog for hosts with nobody to ask. Every question is cancelled, so the
/// call fails but nothing is remembered as a hard "no".
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessDialog;

#[async_trait]
impl PermissionDialog for HeadlessDialog {
    async fn ask(&self, question: PermissionQuestion) -> DialogOutcome {
        tracing::debug!(
            suite = %question.suite,
            capability = %question.capability,
            "No dialog available, cancelling question"
        );
        DialogOutcome::Cancelled
    }
}
