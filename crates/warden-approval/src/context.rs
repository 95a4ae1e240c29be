//! The per-suite security context.
//!
//! A [`SecurityContext`] owns one suite's [`PermissionVector`] and answers
//! the three checks suite code makes:
//!
//! - [`check_if_allowed`](SecurityContext::check_if_allowed): `Allow` or fail,
//!   never a prompt
//! - [`check_for_permission`](SecurityContext::check_for_permission): may
//!   stop and ask the user
//! - [`check_permission`](SecurityContext::check_permission): tri-state
//!   status, never a prompt
//!
//! # Locking
//!
//! Decisions are taken under a plain mutex that is never held across an
//! await. Questions go through a separate async gate, so one suite has at
//! most one question on screen. After passing the gate the decision is
//! taken again: the answer to the previous question may already cover
//! this call.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use warden_capabilities::{
    Capability, DomainPolicyStore, INTERNAL_DOMAIN, PermissionLevel, PermissionVector,
};

use crate::dialog::PermissionDialog;
use crate::error::{ApprovalError, ApprovalResult, CapabilityDenied, DenialReason};
use crate::question::{DialogOutcome, PermissionQuestion, PromptChoice};
use crate::settings::blanket_conflict;

/// Non-prompting answer to "may this suite do X?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// A call would fail without asking.
    Denied,
    /// A call would succeed without asking.
    Allowed,
    /// A call would ask the user.
    Unknown,
}

enum Decision {
    Grant,
    Deny(DenialReason),
    Ask,
}

pub(crate) struct ContextState {
    pub(crate) vector: PermissionVector,
    pub(crate) dirty: bool,
}

impl ContextState {
    pub(crate) fn set(&mut self, cap: Capability, level: PermissionLevel) {
        if self.vector.current(cap) != level {
            self.vector.set_current(cap, level);
            self.dirty = true;
        }
    }
}

/// Permission state and prompting for one running suite.
pub struct SecurityContext {
    suite_id: String,
    suite_name: String,
    domain: String,
    state: Mutex<ContextState>,
    prompt_gate: AsyncMutex<()>,
    dialog: Arc<dyn PermissionDialog>,
    prompt_timeout: Option<Duration>,
}

impl std::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("suite_id", &self.suite_id)
            .field("domain", &self.domain)
            .field("prompt_timeout", &self.prompt_timeout)
            .finish_non_exhaustive()
    }
}

impl SecurityContext {
    /// Create a context over an existing vector (typically loaded from the
    /// suite's saved settings).
    #[must_use]
    pub fn new(
        suite_id: impl Into<String>,
        suite_name: impl Into<String>,
        domain: impl Into<String>,
        vector: PermissionVector,
        dialog: Arc<dyn PermissionDialog>,
    ) -> Self {
        Self {
            suite_id: suite_id.into(),
            suite_name: suite_name.into(),
            domain: domain.into(),
            state: Mutex::new(ContextState {
                vector,
                dirty: false,
            }),
            prompt_gate: AsyncMutex::new(()),
            dialog,
            prompt_timeout: None,
        }
    }

    /// Create a context with the defaults of `domain` as resolved by `store`.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Policy`] if the policy cannot resolve any
    /// domain. Suite startup must stop there.
    pub fn for_domain(
        store: &DomainPolicyStore,
        suite_id: impl Into<String>,
        suite_name: impl Into<String>,
        domain: &str,
        dialog: Arc<dyn PermissionDialog>,
    ) -> ApprovalResult<Self> {
        let permissions = store.for_domain(domain)?;
        let vector = PermissionVector::from_domain(&permissions);
        Ok(Self::new(
            suite_id,
            suite_name,
            permissions.name(),
            vector,
            dialog,
        ))
    }

    /// Context for runtime-internal code: everything `Allow`.
    #[must_use]
    pub fn internal(dialog: Arc<dyn PermissionDialog>) -> Self {
        Self::new(
            INTERNAL_DOMAIN,
            "Runtime",
            INTERNAL_DOMAIN,
            PermissionVector::all_allowed(),
            dialog,
        )
    }

    /// Give up on questions after `timeout`. A timeout counts as an
    /// interruption.
    #[must_use]
    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = Some(timeout);
        self
    }

    /// Suite id.
    #[must_use]
    pub fn suite_id(&self) -> &str {
        &self.suite_id
    }

    /// Suite display name.
    #[must_use]
    pub fn suite_name(&self) -> &str {
        &self.suite_name
    }

    /// Resolved domain name.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ContextState> {
        // Every mutation is a single field store, so a poisoned guard still
        // holds a consistent vector.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current level of `cap`.
    #[must_use]
    pub fn current(&self, cap: Capability) -> PermissionLevel {
        self.state().vector.current(cap)
    }

    /// Ceiling of `cap`.
    #[must_use]
    pub fn maximum(&self, cap: Capability) -> PermissionLevel {
        self.state().vector.maximum(cap)
    }

    /// Start a new scheduling run: every session answer is forgotten.
    pub fn begin_session(&self) {
        self.state().vector.reset_session();
        debug!(suite = %self.suite_id, "Security session reset");
    }

    /// `(current, maximum)` for persisting.
    #[must_use]
    pub fn snapshot(
        &self,
    ) -> (
        [PermissionLevel; Capability::COUNT],
        [PermissionLevel; Capability::COUNT],
    ) {
        let state = self.state();
        (
            *state.vector.current_levels(),
            *state.vector.maximum_levels(),
        )
    }

    /// Whether `current` changed since the last [`mark_clean`](Self::mark_clean).
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state().dirty
    }

    /// Record that the current levels were saved.
    pub fn mark_clean(&self) {
        self.state().dirty = false;
    }

    fn deny(&self, cap: Capability, reason: DenialReason) -> ApprovalError {
        info!(
            suite = %self.suite_id,
            capability = %cap,
            %reason,
            "Capability denied"
        );
        ApprovalError::Denied(CapabilityDenied::new(cap, reason, &self.suite_name))
    }

    /// Fail unless `cap` is `Allow`. Never prompts.
    ///
    /// # Errors
    ///
    /// Returns a [`DenialReason::NotPermitted`] denial otherwise.
    pub fn check_if_allowed(&self, cap: Capability) -> ApprovalResult<()> {
        if self.current(cap) == PermissionLevel::Allow {
            Ok(())
        } else {
            Err(self.deny(cap, DenialReason::NotPermitted))
        }
    }

    /// What a call to [`check_for_permission`](Self::check_for_permission)
    /// would do right now, without asking.
    #[must_use]
    pub fn check_permission(&self, cap: Capability) -> PermissionStatus {
        match self.decide(cap) {
            Decision::Grant => PermissionStatus::Allowed,
            Decision::Deny(_) => PermissionStatus::Denied,
            Decision::Ask => PermissionStatus::Unknown,
        }
    }

    fn decide(&self, cap: Capability) -> Decision {
        let state = self.state();
        let vector = &state.vector;
        if vector.maximum(cap) == PermissionLevel::Never {
            return Decision::Deny(DenialReason::NotConfigured);
        }
        let asked = vector.is_asked(cap);
        match vector.current(cap) {
            PermissionLevel::Allow | PermissionLevel::BlanketGranted => Decision::Grant,
            PermissionLevel::Session if asked => Decision::Grant,
            PermissionLevel::Never => Decision::Deny(DenialReason::NotConfigured),
            PermissionLevel::UserDenied => Decision::Deny(DenialReason::UserDenied),
            PermissionLevel::DenySession if asked => {
                Decision::Deny(DenialReason::DeniedThisSession)
            },
            _ => Decision::Ask,
        }
    }

    /// Check `cap`, asking the user if the current level requires it.
    ///
    /// `subject` is shown in the question (what is being accessed).
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::Denied`] when the capability is not granted,
    /// the user refuses, cancels, or the question is interrupted.
    pub async fn check_for_permission(&self, cap: Capability, subject: &str) -> ApprovalResult<()> {
        match self.decide(cap) {
            Decision::Grant => return Ok(()),
            Decision::Deny(reason) => return Err(self.deny(cap, reason)),
            Decision::Ask => {},
        }

        let _gate = self.prompt_gate.lock().await;

        match self.decide(cap) {
            Decision::Grant => return Ok(()),
            Decision::Deny(reason) => return Err(self.deny(cap, reason)),
            Decision::Ask => {},
        }

        let question = self.build_question(cap, subject);
        debug!(
            suite = %self.suite_id,
            capability = %cap,
            options = ?question.options,
            "Asking for permission"
        );

        let offered = question.options.clone();
        let outcome = match self.prompt_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.dialog.ask(question))
                .await
                .unwrap_or_else(|_| {
                    warn!(suite = %self.suite_id, capability = %cap, "Permission question timed out");
                    DialogOutcome::Interrupted
                }),
            None => self.dialog.ask(question).await,
        };

        self.apply_outcome(cap, &offered, outcome)
    }

    fn build_question(&self, cap: Capability, subject: &str) -> PermissionQuestion {
        let options = self.offered_choices(cap);
        let mut body = format!("{} wants to {}.", self.suite_name, cap.description());
        if !subject.is_empty() {
            body.push_str("\n\n");
            body.push_str(subject);
        }
        body.push_str("\n\nIs that OK?");

        PermissionQuestion {
            suite: self.suite_id.clone(),
            capability: cap,
            title: format!("{} permission", self.suite_name),
            body,
            subject: subject.to_string(),
            options,
        }
    }

    /// Answers the ceiling allows for `cap`, most permissive first.
    #[must_use]
    pub fn offered_choices(&self, cap: Capability) -> Vec<PromptChoice> {
        let state = self.state();
        let vector = &state.vector;
        let ceiling = vector.maximum(cap);

        let mut options = Vec::with_capacity(5);
        if ceiling.permits(PermissionLevel::BlanketGranted) && blanket_conflict(vector, cap).is_none() {
            options.push(PromptChoice::AllowAlways);
        }
        if ceiling.permits(PermissionLevel::Session) {
            options.push(PromptChoice::AllowSession);
        }
        options.extend([
            PromptChoice::AllowOnce,
            PromptChoice::DenyAskLater,
            PromptChoice::DenyNever,
        ]);
        options
    }

    fn apply_outcome(
        &self,
        cap: Capability,
        offered: &[PromptChoice],
        outcome: DialogOutcome,
    ) -> ApprovalResult<()> {
        let outcome = match outcome {
            DialogOutcome::Answered(choice) if !offered.contains(&choice) => {
                warn!(
                    suite = %self.suite_id,
                    capability = %cap,
                    ?choice,
                    "Dialog returned an option that was not offered"
                );
                DialogOutcome::Cancelled
            },
            other => other,
        };

        let reason = {
            let mut state = self.state();
            match outcome {
                DialogOutcome::Answered(PromptChoice::AllowAlways) => {
                    state.set(cap, PermissionLevel::BlanketGranted);
                    state.vector.mark_asked(cap);
                    None
                },
                DialogOutcome::Answered(PromptChoice::AllowSession) => {
                    state.set(cap, PermissionLevel::Session);
                    state.vector.mark_asked(cap);
                    None
                },
                DialogOutcome::Answered(PromptChoice::AllowOnce) => {
                    if matches!(
                        state.vector.current(cap),
                        PermissionLevel::Session
                            | PermissionLevel::DenySession
                            | PermissionLevel::Deny
                    ) {
                        state.set(cap, PermissionLevel::OneShot);
                    }
                    state.vector.mark_asked(cap);
                    None
                },
                DialogOutcome::Answered(PromptChoice::DenyAskLater) => {
                    state.set(cap, PermissionLevel::DenySession);
                    state.vector.mark_asked(cap);
                    Some(DenialReason::DeniedThisSession)
                },
                DialogOutcome::Answered(PromptChoice::DenyNever) => {
                    state.set(cap, PermissionLevel::UserDenied);
                    state.vector.mark_asked(cap);
                    Some(DenialReason::UserDenied)
                },
                DialogOutcome::Cancelled => {
                    state.set(cap, PermissionLevel::DenySession);
                    Some(DenialReason::Cancelled)
                },
                DialogOutcome::Interrupted => Some(DenialReason::Interrupted),
            }
        };

        match reason {
            None => {
                debug!(suite = %self.suite_id, capability = %cap, "Permission granted by user");
                Ok(())
            },
            Some(reason) => Err(self.deny(cap, reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Answers {
        queue: Mutex<VecDeque<DialogOutcome>>,
        asked: AtomicUsize,
        last: Mutex<Option<PermissionQuestion>>,
    }

    impl Answers {
        fn new(outcomes: impl IntoIterator<Item = DialogOutcome>) -> Arc<Self> {
            Arc::new(Self {
                queue: Mutex::new(outcomes.into_iter().collect()),
                asked: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }

        fn count(&self) -> usize {
            self.asked.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PermissionDialog for Answers {
        async fn ask(&self, question: PermissionQuestion) -> DialogOutcome {
            self.asked.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(question);
            self.queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(DialogOutcome::Cancelled)
        }
    }

    struct Never;

    #[async_trait]
    impl PermissionDialog for Never {
        async fn ask(&self, _question: PermissionQuestion) -> DialogOutcome {
            std::future::pending().await
        }
    }

    fn vector(cap: Capability, maximum: PermissionLevel, current: PermissionLevel) -> PermissionVector {
        let mut max = [PermissionLevel::Never; Capability::COUNT];
        let mut cur = [PermissionLevel::Never; Capability::COUNT];
        max[cap.index()] = maximum;
        cur[cap.index()] = current;
        PermissionVector::from_levels(&cur, &max)
    }

    fn context(v: PermissionVector, dialog: Arc<dyn PermissionDialog>) -> SecurityContext {
        SecurityContext::new("demo", "Demo", "untrusted", v, dialog)
    }

    fn answered(choice: PromptChoice) -> DialogOutcome {
        DialogOutcome::Answered(choice)
    }

    #[tokio::test]
    async fn test_decided_levels_do_not_prompt() {
        let dialog = Answers::new([]);
        let cap = Capability::NetHttp;

        let ctx = context(vector(cap, PermissionLevel::Allow, PermissionLevel::Allow), dialog.clone());
        assert!(ctx.check_for_permission(cap, "").await.is_ok());

        let ctx = context(
            vector(cap, PermissionLevel::Blanket, PermissionLevel::BlanketGranted),
            dialog.clone(),
        );
        assert!(ctx.check_for_permission(cap, "").await.is_ok());

        let ctx = context(
            vector(cap, PermissionLevel::Blanket, PermissionLevel::UserDenied),
            dialog.clone(),
        );
        let err = ctx.check_for_permission(cap, "").await.unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::UserDenied));

        let ctx = context(PermissionVector::denied(), dialog.clone());
        let err = ctx.check_for_permission(cap, "").await.unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::NotConfigured));

        assert_eq!(dialog.count(), 0);
    }

    #[tokio::test]
    async fn test_blanket_grant_is_remembered() {
        let cap = Capability::NetHttp;
        let dialog = Answers::new([answered(PromptChoice::AllowAlways)]);
        let ctx = context(vector(cap, PermissionLevel::Blanket, PermissionLevel::Session), dialog.clone());

        ctx.check_for_permission(cap, "http://example.com").await.unwrap();
        assert_eq!(ctx.current(cap), PermissionLevel::BlanketGranted);
        assert!(ctx.is_dirty());

        ctx.begin_session();
        ctx.check_for_permission(cap, "").await.unwrap();
        assert_eq!(dialog.count(), 1);
    }

    #[tokio::test]
    async fn test_session_grant_prompts_once_per_run() {
        let cap = Capability::NetHttp;
        let dialog = Answers::new([
            answered(PromptChoice::AllowSession),
            answered(PromptChoice::AllowSession),
        ]);
        let ctx = context(vector(cap, PermissionLevel::Session, PermissionLevel::Session), dialog.clone());

        ctx.check_for_permission(cap, "").await.unwrap();
        ctx.check_for_permission(cap, "").await.unwrap();
        assert_eq!(dialog.count(), 1);
        assert_eq!(ctx.check_permission(cap), PermissionStatus::Allowed);

        ctx.begin_session();
        assert_eq!(ctx.check_permission(cap), PermissionStatus::Unknown);
        ctx.check_for_permission(cap, "").await.unwrap();
        assert_eq!(dialog.count(), 2);
    }

    #[tokio::test]
    async fn test_allow_once_asks_every_time() {
        let cap = Capability::FileRead;
        let dialog = Answers::new([
            answered(PromptChoice::AllowOnce),
            answered(PromptChoice::AllowOnce),
        ]);
        let ctx = context(vector(cap, PermissionLevel::Session, PermissionLevel::Session), dialog.clone());

        ctx.check_for_permission(cap, "").await.unwrap();
        assert_eq!(ctx.current(cap), PermissionLevel::OneShot);
        ctx.check_for_permission(cap, "").await.unwrap();
        assert_eq!(dialog.count(), 2);
    }

    #[tokio::test]
    async fn test_cancel_leaves_deny_session() {
        let cap = Capability::NetHttp;
        let dialog = Answers::new([DialogOutcome::Cancelled, answered(PromptChoice::AllowOnce)]);
        let ctx = context(vector(cap, PermissionLevel::Session, PermissionLevel::OneShot), dialog.clone());

        let err = ctx.check_for_permission(cap, "").await.unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::Cancelled));
        assert_eq!(ctx.current(cap), PermissionLevel::DenySession);

        // Still re-askable.
        ctx.check_for_permission(cap, "").await.unwrap();
        assert_eq!(dialog.count(), 2);
        assert_eq!(ctx.current(cap), PermissionLevel::OneShot);
    }

    #[tokio::test]
    async fn test_deny_ask_later_holds_for_the_run() {
        let cap = Capability::MessageSend;
        let dialog = Answers::new([answered(PromptChoice::DenyAskLater)]);
        let ctx = context(vector(cap, PermissionLevel::OneShot, PermissionLevel::OneShot), dialog.clone());

        let err = ctx.check_for_permission(cap, "+15550100").await.unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::DeniedThisSession));
        let err = ctx.check_for_permission(cap, "+15550100").await.unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::DeniedThisSession));
        assert_eq!(dialog.count(), 1);

        ctx.begin_session();
        assert_eq!(ctx.check_permission(cap), PermissionStatus::Unknown);
    }

    #[tokio::test]
    async fn test_deny_never_persists() {
        let cap = Capability::MediaRecord;
        let dialog = Answers::new([answered(PromptChoice::DenyNever)]);
        let ctx = context(vector(cap, PermissionLevel::OneShot, PermissionLevel::OneShot), dialog.clone());

        assert!(ctx.check_for_permission(cap, "").await.is_err());
        assert_eq!(ctx.current(cap), PermissionLevel::UserDenied);
        ctx.begin_session();
        assert_eq!(ctx.check_permission(cap), PermissionStatus::Denied);
    }

    #[tokio::test]
    async fn test_options_follow_ceiling() {
        let dialog = Answers::new([]);
        let cap = Capability::NetHttp;

        let ctx = context(vector(cap, PermissionLevel::OneShot, PermissionLevel::OneShot), dialog.clone());
        assert_eq!(
            ctx.offered_choices(cap),
            vec![
                PromptChoice::AllowOnce,
                PromptChoice::DenyAskLater,
                PromptChoice::DenyNever
            ]
        );

        let ctx = context(vector(cap, PermissionLevel::Blanket, PermissionLevel::Session), dialog);
        assert_eq!(ctx.offered_choices(cap).first(), Some(&PromptChoice::AllowAlways));
        assert!(ctx.offered_choices(cap).contains(&PromptChoice::AllowSession));
    }

    #[tokio::test]
    async fn test_unoffered_answer_counts_as_cancel() {
        let cap = Capability::NetHttp;
        let dialog = Answers::new([answered(PromptChoice::AllowAlways)]);
        let ctx = context(vector(cap, PermissionLevel::OneShot, PermissionLevel::OneShot), dialog);

        let err = ctx.check_for_permission(cap, "").await.unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::Cancelled));
        assert_eq!(ctx.current(cap), PermissionLevel::DenySession);
    }

    #[tokio::test]
    async fn test_question_text() {
        let cap = Capability::NetHttp;
        let dialog = Answers::new([answered(PromptChoice::AllowOnce)]);
        let ctx = context(vector(cap, PermissionLevel::OneShot, PermissionLevel::OneShot), dialog.clone());

        ctx.check_for_permission(cap, "http://example.com/feed").await.unwrap();
        let question = dialog.last.lock().unwrap().clone().unwrap();
        assert_eq!(question.suite, "demo");
        assert_eq!(question.capability, cap);
        assert!(question.body.starts_with("Demo wants to"));
        assert!(question.body.contains("http://example.com/feed"));
    }

    #[tokio::test]
    async fn test_timeout_is_an_interruption() {
        let cap = Capability::NetHttp;
        let ctx = context(
            vector(cap, PermissionLevel::Session, PermissionLevel::Session),
            Arc::new(Never),
        )
        .with_prompt_timeout(Duration::from_millis(20));

        let err = ctx.check_for_permission(cap, "").await.unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::Interrupted));
        assert_eq!(ctx.current(cap), PermissionLevel::Session);
        assert!(!ctx.is_dirty());
    }

    #[tokio::test]
    async fn test_check_if_allowed() {
        let ctx = SecurityContext::internal(Answers::new([]));
        assert!(ctx.check_if_allowed(Capability::SystemAms).is_ok());

        let cap = Capability::NetHttp;
        let ctx = context(
            vector(cap, PermissionLevel::Blanket, PermissionLevel::BlanketGranted),
            Answers::new([]),
        );
        let err = ctx.check_if_allowed(cap).unwrap_err();
        assert_eq!(err.denial_reason(), Some(DenialReason::NotPermitted));
    }

    #[test]
    fn test_for_domain_falls_back() {
        let store = DomainPolicyStore::from_text("domain: untrusted\nsession(oneshot): net.http\n");
        let ctx = SecurityContext::for_domain(&store, "demo", "Demo", "nonexistent", Answers::new([]))
            .unwrap();
        assert_eq!(ctx.domain(), "untrusted");
        assert_eq!(ctx.maximum(Capability::NetHttp), PermissionLevel::Session);
        assert_eq!(ctx.current(Capability::NetHttp), PermissionLevel::OneShot);

        let broken = DomainPolicyStore::from_text("domain untrusted\n");
        assert!(matches!(
            SecurityContext::for_domain(&broken, "demo", "Demo", "untrusted", Answers::new([])),
            Err(ApprovalError::Policy(_))
        ));
    }
}
