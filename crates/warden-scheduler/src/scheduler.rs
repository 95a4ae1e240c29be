//! The scheduler and its dispatch loop.
//!
//! # Dispatch
//!
//! [`Scheduler::schedule`] runs a loop until the registry is empty:
//!
//! 1. Under the lock, pick the record with the highest-priority state
//!    (round-robin among equals).
//! 2. If that state is stable, wait for a state change.
//! 3. Otherwise advance it under the lock, release the lock, and run the
//!    matching callback or display call.
//!
//! Callbacks and display calls never run under the lock: they may block on
//! the user, and any thread must be able to change states meanwhile.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::application::{AppClassId, AppHandle, AppInfo, Application, RecordId, SuiteInfo};
use crate::display::Display;
use crate::error::{AppResult, SchedulerError, SchedulerResult};
use crate::record::{Registry, Step};
use crate::state::{AppState, StateRequest};

pub(crate) struct Shared {
    registry: Mutex<Registry>,
    changed: Notify,
    scheduling: AtomicBool,
    display: Arc<dyn Display>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Registry updates are single assignments; a panic elsewhere cannot
        // leave it half-written.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn request(&self, id: RecordId, request: StateRequest) -> SchedulerResult<bool> {
        let changed = self
            .lock()
            .request(id, request)
            .ok_or(SchedulerError::UnknownRecord(id))?;
        if changed {
            self.changed.notify_one();
        }
        Ok(changed)
    }
}

/// Clears the scheduling flag however `schedule` exits.
struct ScheduleGuard<'a>(&'a AtomicBool);

impl Drop for ScheduleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Lifecycle scheduler for one suite at a time.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("records", &self.record_count())
            .field("suite", &self.running_suite())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler driving `display`.
    #[must_use]
    pub fn new(display: Arc<dyn Display>) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                changed: Notify::new(),
                scheduling: AtomicBool::new(false),
                display,
            }),
        }
    }

    /// Register an application instance. It starts in `PausedResume`; a live
    /// instance of the same class is sent to `DestroyPending`.
    pub fn register(&self, app: Arc<dyn Application>, class: AppClassId) -> RecordId {
        let id = self.shared.lock().insert(class.clone(), app);
        info!(record = %id, class = %class, "Application registered");
        self.shared.changed.notify_one();
        id
    }

    /// Tear everything down: every live record goes to `DestroyPending` and
    /// the running `schedule` will return `false`.
    ///
    /// With no `schedule` running only the records are affected; the next
    /// run still reports how it ended on its own terms.
    pub fn shutdown(&self) {
        let (moved, active) = {
            let mut registry = self.shared.lock();
            let active = registry.suite.is_some();
            if active {
                registry.shutting_down = true;
            }
            (registry.destroy_all(), active)
        };
        info!(records = moved, active, "Scheduler shutting down");
        self.shared.changed.notify_one();
    }

    /// Whether a live (not leaving) instance of `class` is registered.
    #[must_use]
    pub fn is_scheduled(&self, class: &AppClassId) -> bool {
        self.shared.lock().is_scheduled(class)
    }

    /// Ask a foreground application to pause.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownRecord`] if `id` is not registered.
    pub fn pause(&self, id: RecordId) -> SchedulerResult<bool> {
        self.shared.request(id, StateRequest::Pause)
    }

    /// Ask a paused application to come back.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownRecord`] if `id` is not registered.
    pub fn resume_request(&self, id: RecordId) -> SchedulerResult<bool> {
        self.shared.request(id, StateRequest::ResumeRequest)
    }

    /// Ask an application to tear down.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownRecord`] if `id` is not registered.
    pub fn destroy(&self, id: RecordId) -> SchedulerResult<bool> {
        self.shared.request(id, StateRequest::Destroy)
    }

    /// The application paused itself.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownRecord`] if `id` is not registered.
    pub fn notify_paused(&self, id: RecordId) -> SchedulerResult<bool> {
        self.shared.request(id, StateRequest::NotifyPaused)
    }

    /// The application exited on its own.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownRecord`] if `id` is not registered.
    pub fn notify_destroyed(&self, id: RecordId) -> SchedulerResult<bool> {
        self.shared.request(id, StateRequest::NotifyDestroyed)
    }

    /// Current state of a record, `None` once it has been removed.
    #[must_use]
    pub fn state_of(&self, id: RecordId) -> Option<AppState> {
        self.shared.lock().state_of(id)
    }

    /// Suite being scheduled, if any.
    #[must_use]
    pub fn running_suite(&self) -> Option<SuiteInfo> {
        self.shared.lock().suite.clone()
    }

    /// Number of records, including ones awaiting removal.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.shared.lock().len()
    }

    /// Whether [`shutdown`](Self::shutdown) was called during this run.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shared.lock().shutting_down
    }

    /// Every record and its state.
    #[must_use]
    pub fn records(&self) -> Vec<(AppInfo, AppState)> {
        self.shared.lock().snapshot()
    }

    /// Run `suite` until every application is gone.
    ///
    /// Returns `true` when the applications all exited on their own and
    /// `false` when the run ended through [`shutdown`](Self::shutdown).
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyScheduling`] if another `schedule`
    /// is running on this scheduler.
    pub async fn schedule(&self, suite: &SuiteInfo) -> SchedulerResult<bool> {
        if self
            .shared
            .scheduling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let running = self
                .running_suite()
                .map_or_else(|| "<starting>".to_string(), |s| s.id);
            return Err(SchedulerError::AlreadyScheduling { running });
        }
        let _guard = ScheduleGuard(&self.shared.scheduling);

        {
            let mut registry = self.shared.lock();
            registry.suite = Some(suite.clone());
            registry.shutting_down = false;
        }
        info!(suite = %suite.id, "Scheduling suite");

        self.dispatch().await;

        let normal_exit = {
            let mut registry = self.shared.lock();
            let shut_down = registry.shutting_down;
            registry.shutting_down = false;
            registry.suite = None;
            !shut_down
        };
        info!(suite = %suite.id, normal_exit, "Suite finished");
        Ok(normal_exit)
    }

    async fn dispatch(&self) {
        let display = Arc::clone(&self.shared.display);
        let mut foreground: Option<AppInfo> = None;

        loop {
            self.reconcile(display.as_ref(), &mut foreground).await;

            let step = self.shared.lock().next_step();
            match step {
                Step::Finished => {
                    display.clear().await;
                    return;
                },
                Step::Idle => {
                    self.shared.changed.notified().await;
                },
                Step::Start(info, app) => {
                    // The display follows `start`: an app still waiting on a
                    // permission answer is not shown yet.
                    if self.run_callback(&info, Callback::Start, app.as_ref()).await
                        && self.state_of(info.id) == Some(AppState::Active)
                    {
                        // Activation may have demoted the previous foreground.
                        self.reconcile(display.as_ref(), &mut foreground).await;
                        display.activate(&info).await;
                        foreground = Some(info);
                    }
                },
                Step::Pause(info, app) => {
                    self.run_callback(&info, Callback::Pause, app.as_ref()).await;
                },
                Step::Destroy(info, app) => {
                    self.run_callback(&info, Callback::Destroy, app.as_ref()).await;
                },
                Step::Removed(info) => {
                    debug!(app = %info, "Application removed");
                },
            }
        }
    }

    /// Deactivate the last activated record if it is no longer `Active`.
    async fn reconcile(&self, display: &dyn Display, foreground: &mut Option<AppInfo>) {
        let stale = foreground
            .as_ref()
            .is_some_and(|fg| self.state_of(fg.id) != Some(AppState::Active));
        if stale && let Some(fg) = foreground.take() {
            display.deactivate(&fg).await;
        }
    }

    /// Run one callback, containing errors and panics. A failed start or
    /// pause sends the record to `DestroyPending`. Returns whether the
    /// callback succeeded.
    async fn run_callback(&self, info: &AppInfo, callback: Callback, app: &dyn Application) -> bool {
        let handle = AppHandle::new(info.clone(), Arc::downgrade(&self.shared));
        let call = async {
            match callback {
                Callback::Start => app.start(&handle).await,
                Callback::Pause => app.pause(&handle).await,
                Callback::Destroy => app.destroy(&handle, true).await,
            }
        };
        let outcome: Result<AppResult<()>, _> = AssertUnwindSafe(call).catch_unwind().await;

        let failure = match outcome {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string()),
        };

        warn!(app = %info, callback = callback.name(), error = %failure, "Application callback failed");
        if callback != Callback::Destroy {
            self.shared.lock().force_destroy(info.id);
            self.shared.changed.notify_one();
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Callback {
    Start,
    Pause,
    Destroy,
}

impl Callback {
    fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Destroy => "destroy",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    #[derive(Default)]
    struct Screen {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Display for Screen {
        async fn activate(&self, app: &AppInfo) {
            self.events.lock().unwrap().push(format!("activate {}", app.class));
        }

        async fn deactivate(&self, app: &AppInfo) {
            self.events.lock().unwrap().push(format!("deactivate {}", app.class));
        }

        async fn clear(&self) {
            self.events.lock().unwrap().push("clear".to_string());
        }
    }

    /// Exits from `start` when `exit_on_start`, otherwise waits to be told.
    struct TestApp {
        exit_on_start: bool,
        fail_start: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl TestApp {
        fn new(exit_on_start: bool) -> Arc<Self> {
            Arc::new(Self {
                exit_on_start,
                fail_start: false,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                exit_on_start: false,
                fail_start: true,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Application for TestApp {
        async fn start(&self, handle: &AppHandle) -> AppResult<()> {
            self.calls.lock().unwrap().push("start");
            if self.fail_start {
                return Err(crate::error::AppError::failed("boom"));
            }
            if self.exit_on_start {
                handle.notify_destroyed();
            }
            Ok(())
        }

        async fn pause(&self, _handle: &AppHandle) -> AppResult<()> {
            self.calls.lock().unwrap().push("pause");
            Ok(())
        }

        async fn destroy(&self, _handle: &AppHandle, unconditional: bool) -> AppResult<()> {
            assert!(unconditional);
            self.calls.lock().unwrap().push("destroy");
            Ok(())
        }
    }

    fn suite() -> SuiteInfo {
        SuiteInfo::new("demo", "Demo", "untrusted")
    }

    async fn wait_for(scheduler: &Scheduler, id: RecordId, state: AppState) {
        for _ in 0..400 {
            if scheduler.state_of(id) == Some(state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("record {id} never reached {state}");
    }

    async fn wait_for_events(screen: &Screen, count: usize) {
        for _ in 0..400 {
            if screen.events.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("display saw fewer than {count} events");
    }

    #[tokio::test]
    async fn test_natural_completion_returns_true() {
        let screen = Arc::new(Screen::default());
        let scheduler = Scheduler::new(screen.clone());
        let app = TestApp::new(true);
        scheduler.register(app.clone(), "hello".into());

        assert!(scheduler.schedule(&suite()).await.unwrap());
        assert_eq!(app.calls(), vec!["start"]);
        assert_eq!(scheduler.record_count(), 0);
        assert_eq!(screen.events.lock().unwrap().last().unwrap(), "clear");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_returns_false() {
        let scheduler = Scheduler::new(Arc::new(Screen::default()));
        let app = TestApp::new(false);
        let id = scheduler.register(app.clone(), "long".into());

        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.schedule(&suite()).await })
        };
        wait_for(&scheduler, id, AppState::Active).await;
        assert_eq!(scheduler.running_suite().unwrap().id, "demo");

        scheduler.shutdown();
        assert!(!runner.await.unwrap().unwrap());
        assert_eq!(app.calls(), vec!["start", "destroy"]);
        assert!(!scheduler.is_shutting_down());
        assert!(scheduler.running_suite().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_schedule_fails_fast() {
        let scheduler = Scheduler::new(Arc::new(Screen::default()));
        let id = scheduler.register(TestApp::new(false), "long".into());

        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.schedule(&suite()).await })
        };
        wait_for(&scheduler, id, AppState::Active).await;

        let err = scheduler.schedule(&suite()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyScheduling { .. }));

        scheduler.shutdown();
        assert!(!runner.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_failing_start_is_torn_down() {
        let scheduler = Scheduler::new(Arc::new(Screen::default()));
        let app = TestApp::failing();
        scheduler.register(app.clone(), "broken".into());

        assert!(scheduler.schedule(&suite()).await.unwrap());
        assert_eq!(app.calls(), vec!["start", "destroy"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pause_and_resume() {
        let screen = Arc::new(Screen::default());
        let scheduler = Scheduler::new(screen.clone());
        let app = TestApp::new(false);
        let id = scheduler.register(app.clone(), "app".into());

        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.schedule(&suite()).await })
        };
        wait_for_events(&screen, 1).await;

        assert!(scheduler.pause(id).unwrap());
        wait_for(&scheduler, id, AppState::Paused).await;
        assert!(!scheduler.pause(id).unwrap());

        assert!(scheduler.resume_request(id).unwrap());
        wait_for_events(&screen, 3).await;

        scheduler.destroy(id).unwrap();
        assert!(runner.await.unwrap().unwrap());
        assert_eq!(app.calls(), vec!["start", "pause", "start", "destroy"]);

        let events = screen.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "activate app",
                "deactivate app",
                "activate app",
                "deactivate app",
                "clear"
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_single_foreground() {
        let screen = Arc::new(Screen::default());
        let scheduler = Scheduler::new(screen.clone());
        let first = TestApp::new(false);
        let second = TestApp::new(false);
        let a = scheduler.register(first.clone(), "first".into());

        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.schedule(&suite()).await })
        };
        wait_for_events(&screen, 1).await;

        let b = scheduler.register(second.clone(), "second".into());
        wait_for(&scheduler, a, AppState::Paused).await;
        wait_for_events(&screen, 3).await;
        assert_eq!(scheduler.state_of(b), Some(AppState::Active));
        let active = scheduler
            .records()
            .iter()
            .filter(|(_, s)| *s == AppState::Active)
            .count();
        assert_eq!(active, 1);

        scheduler.shutdown();
        assert!(!runner.await.unwrap().unwrap());
        assert_eq!(first.calls(), vec!["start", "pause", "destroy"]);
        assert_eq!(second.calls(), vec!["start", "destroy"]);
        assert_eq!(
            screen.events.lock().unwrap()[..3],
            ["activate first", "deactivate first", "activate second"]
        );
    }

    #[tokio::test]
    async fn test_idle_shutdown_does_not_leak_into_next_run() {
        let scheduler = Scheduler::new(Arc::new(Screen::default()));
        scheduler.shutdown();
        assert!(!scheduler.is_shutting_down());

        let app = TestApp::new(true);
        scheduler.register(app.clone(), "hello".into());
        assert!(scheduler.schedule(&suite()).await.unwrap());
        assert_eq!(app.calls(), vec!["start"]);
    }

    #[tokio::test]
    async fn test_unknown_record() {
        let scheduler = Scheduler::new(Arc::new(Screen::default()));
        assert!(matches!(
            scheduler.pause(RecordId(42)),
            Err(SchedulerError::UnknownRecord(_))
        ));
    }
}
