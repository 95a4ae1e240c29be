//! Mock implementations for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use warden_approval::{
    DenialReason, DialogOutcome, PermissionDialog, PermissionQuestion, PromptChoice,
    SecurityContext,
};
use warden_capabilities::Capability;
use warden_scheduler::{AppClassId, AppError, AppHandle, AppInfo, AppResult, Application, Display};

/// Dialog answering from a script.
///
/// Answers are taken in order; once the script runs out the default outcome
/// (cancel, unless changed) is returned. Every question is recorded.
///
/// Uses `std::sync::Mutex` internally so answers can be queued from sync
/// test code.
#[derive(Debug)]
pub struct ScriptedDialog {
    answers: Mutex<VecDeque<DialogOutcome>>,
    questions: Mutex<Vec<PermissionQuestion>>,
    default_outcome: DialogOutcome,
    delay: Option<Duration>,
    hold: Option<Arc<Notify>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for ScriptedDialog {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDialog {
    /// Empty script; every question is cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            questions: Mutex::new(Vec::new()),
            default_outcome: DialogOutcome::Cancelled,
            delay: None,
            hold: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue an answer.
    #[must_use]
    pub fn with_answer(self, choice: PromptChoice) -> Self {
        self.push(choice);
        self
    }

    /// Outcome once the script is exhausted.
    #[must_use]
    pub fn with_default(mut self, outcome: DialogOutcome) -> Self {
        self.default_outcome = outcome;
        self
    }

    /// Take `delay` to answer every question.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Do not answer until `gate` is notified.
    #[must_use]
    pub fn held_by(mut self, gate: Arc<Notify>) -> Self {
        self.hold = Some(gate);
        self
    }

    /// Queue an answer.
    pub fn push(&self, choice: PromptChoice) {
        self.push_outcome(DialogOutcome::Answered(choice));
    }

    /// Queue any outcome.
    pub fn push_outcome(&self, outcome: DialogOutcome) {
        if let Ok(mut answers) = self.answers.lock() {
            answers.push_back(outcome);
        }
    }

    /// Every question asked so far.
    #[must_use]
    pub fn questions(&self) -> Vec<PermissionQuestion> {
        self.questions.lock().map(|q| q.clone()).unwrap_or_default()
    }

    /// Largest number of questions that were open at the same time.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PermissionDialog for ScriptedDialog {
    async fn ask(&self, question: PermissionQuestion) -> DialogOutcome {
        if let Ok(mut questions) = self.questions.lock() {
            questions.push(question);
        }
        let open = self.in_flight.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.max_in_flight.fetch_max(open, Ordering::SeqCst);

        if let Some(gate) = &self.hold {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .answers
            .lock()
            .ok()
            .and_then(|mut a| a.pop_front())
            .unwrap_or(self.default_outcome);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// Something the display was told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// `activate` for this class.
    Activate(AppClassId),
    /// `deactivate` for this class.
    Deactivate(AppClassId),
    /// `clear`.
    Clear,
}

/// Display that records every call.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    events: Mutex<Vec<DisplayEvent>>,
}

impl RecordingDisplay {
    /// Empty recording.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<DisplayEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Number of events so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or_default()
    }

    /// Whether nothing was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, event: DisplayEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl Display for RecordingDisplay {
    async fn activate(&self, app: &AppInfo) {
        self.record(DisplayEvent::Activate(app.class.clone()));
    }

    async fn deactivate(&self, app: &AppInfo) {
        self.record(DisplayEvent::Deactivate(app.class.clone()));
    }

    async fn clear(&self) {
        self.record(DisplayEvent::Clear);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Misbehavior {
    None,
    FailStart,
    PanicStart,
    FailPause,
}

/// Application that records its callbacks and follows a script.
pub struct ScriptedApp {
    exit_on_start: bool,
    misbehavior: Misbehavior,
    request: Option<(Arc<SecurityContext>, Capability, usize)>,
    start_gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<&'static str>>,
    permission_results: Mutex<Vec<Result<(), DenialReason>>>,
    handle: Mutex<Option<AppHandle>>,
}

impl std::fmt::Debug for ScriptedApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedApp")
            .field("exit_on_start", &self.exit_on_start)
            .field("misbehavior", &self.misbehavior)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl ScriptedApp {
    fn build(exit_on_start: bool, misbehavior: Misbehavior) -> Self {
        Self {
            exit_on_start,
            misbehavior,
            request: None,
            start_gate: None,
            calls: Mutex::new(Vec::new()),
            permission_results: Mutex::new(Vec::new()),
            handle: Mutex::new(None),
        }
    }

    /// Exits on its own as soon as it starts.
    #[must_use]
    pub fn exiting() -> Arc<Self> {
        Arc::new(Self::build(true, Misbehavior::None))
    }

    /// Stays until paused, destroyed or told to exit through [`handle`](Self::handle).
    #[must_use]
    pub fn waiting() -> Arc<Self> {
        Arc::new(Self::build(false, Misbehavior::None))
    }

    /// Stays in `start` until `gate` is notified, then waits like
    /// [`waiting`](Self::waiting).
    #[must_use]
    pub fn start_held_by(gate: Arc<Notify>) -> Arc<Self> {
        let mut app = Self::build(false, Misbehavior::None);
        app.start_gate = Some(gate);
        Arc::new(app)
    }

    /// Returns an error from `start`.
    #[must_use]
    pub fn failing_start() -> Arc<Self> {
        Arc::new(Self::build(false, Misbehavior::FailStart))
    }

    /// Panics in `start`.
    #[must_use]
    pub fn panicking_start() -> Arc<Self> {
        Arc::new(Self::build(false, Misbehavior::PanicStart))
    }

    /// Returns an error from `pause`.
    #[must_use]
    pub fn failing_pause() -> Arc<Self> {
        Arc::new(Self::build(false, Misbehavior::FailPause))
    }

    /// Asks for `capability` once on start, then exits.
    #[must_use]
    pub fn requesting(security: Arc<SecurityContext>, capability: Capability) -> Arc<Self> {
        Self::requesting_times(security, capability, 1)
    }

    /// Asks for `capability` `times` times on start, then exits.
    #[must_use]
    pub fn requesting_times(
        security: Arc<SecurityContext>,
        capability: Capability,
        times: usize,
    ) -> Arc<Self> {
        let mut app = Self::build(true, Misbehavior::None);
        app.request = Some((security, capability, times));
        Arc::new(app)
    }

    /// Callbacks received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Outcome of every permission request made on start.
    #[must_use]
    pub fn permission_results(&self) -> Vec<Result<(), DenialReason>> {
        self.permission_results
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Handle from the last callback.
    #[must_use]
    pub fn handle(&self) -> Option<AppHandle> {
        self.handle.lock().ok().and_then(|h| h.clone())
    }

    fn record(&self, call: &'static str, handle: &AppHandle) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(handle.clone());
        }
    }

    async fn run_requests(&self) -> AppResult<()> {
        let Some((security, capability, times)) = &self.request else {
            return Ok(());
        };
        for _ in 0..*times {
            let result = match security.check_for_permission(*capability, "").await {
                Ok(()) => Ok(()),
                Err(e) => Err(e.denial_reason().ok_or_else(|| AppError::other(e))?),
            };
            if let Ok(mut results) = self.permission_results.lock() {
                results.push(result);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Application for ScriptedApp {
    async fn start(&self, handle: &AppHandle) -> AppResult<()> {
        self.record("start", handle);
        match self.misbehavior {
            Misbehavior::FailStart => return Err(AppError::failed("scripted start failure")),
            Misbehavior::PanicStart => panic!("scripted start panic"),
            Misbehavior::None | Misbehavior::FailPause => {},
        }
        if let Some(gate) = &self.start_gate {
            gate.notified().await;
        }
        self.run_requests().await?;
        if self.exit_on_start {
            handle.notify_destroyed();
        }
        Ok(())
    }

    async fn pause(&self, handle: &AppHandle) -> AppResult<()> {
        self.record("pause", handle);
        if self.misbehavior == Misbehavior::FailPause {
            return Err(AppError::failed("scripted pause failure"));
        }
        Ok(())
    }

    async fn destroy(&self, handle: &AppHandle, _unconditional: bool) -> AppResult<()> {
        self.record("destroy", handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test_security_context;

    #[tokio::test]
    async fn test_scripted_dialog_answers_in_order() {
        let dialog = Arc::new(
            ScriptedDialog::new()
                .with_answer(PromptChoice::AllowOnce)
                .with_answer(PromptChoice::DenyAskLater),
        );
        let security = test_security_context("untrusted", dialog.clone());

        assert!(security.check_for_permission(Capability::FileRead, "").await.is_ok());
        assert!(security.check_for_permission(Capability::FileRead, "").await.is_err());
        assert_eq!(dialog.questions().len(), 2);
        assert_eq!(dialog.max_concurrent(), 1);
    }

    #[tokio::test]
    async fn test_recording_display() {
        let display = RecordingDisplay::new();
        let info = AppInfo {
            id: warden_scheduler::Scheduler::new(Arc::new(RecordingDisplay::new()))
                .register(ScriptedApp::waiting(), "probe".into()),
            class: "probe".into(),
        };
        display.activate(&info).await;
        display.clear().await;
        assert_eq!(
            display.events(),
            vec![DisplayEvent::Activate("probe".into()), DisplayEvent::Clear]
        );
    }
}
