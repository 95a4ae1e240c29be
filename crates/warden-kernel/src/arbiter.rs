//! Interrupt arbitration.
//!
//! An inbound-data or alarm event may want to launch a suite other than the
//! one being scheduled. The running suite's own security context decides:
//! the question is asked on the caller's task, never on the dispatch loop,
//! so the scheduler keeps servicing state changes while the user thinks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{Instrument, debug, info};
use warden_approval::{DenialReason, SecurityContext};
use warden_capabilities::Capability;
use warden_scheduler::{AppClassId, RecordId, Scheduler, SuiteInfo};
use warden_telemetry::RunContext;

use crate::error::{KernelError, KernelResult};
use crate::factory::{AppRegistry, LaunchContext};
use crate::queue::{LaunchReason, LaunchRequest, SuiteQueue};
use crate::suite::SuiteId;

/// An external event asking for a suite to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptEvent {
    /// Data arrived on a connection `suite` registered for.
    InboundData {
        /// Suite to launch.
        suite: SuiteId,
        /// Class registered for the connection.
        app_class: AppClassId,
        /// Connection the data is waiting on.
        connection: String,
    },
    /// An alarm `suite` registered fired.
    Alarm {
        /// Suite to launch.
        suite: SuiteId,
        /// Class registered for the alarm.
        app_class: AppClassId,
    },
}

impl InterruptEvent {
    /// Target suite.
    #[must_use]
    pub fn suite(&self) -> &SuiteId {
        match self {
            Self::InboundData { suite, .. } | Self::Alarm { suite, .. } => suite,
        }
    }

    /// Target class.
    #[must_use]
    pub fn app_class(&self) -> &AppClassId {
        match self {
            Self::InboundData { app_class, .. } | Self::Alarm { app_class, .. } => app_class,
        }
    }

    /// Capability the incumbent must hold for this event to interrupt it.
    #[must_use]
    pub fn capability(&self) -> Capability {
        match self {
            Self::InboundData { .. } => Capability::PushInterrupt,
            Self::Alarm { .. } => Capability::AlarmInterrupt,
        }
    }

    fn reason(&self) -> LaunchReason {
        match self {
            Self::InboundData { connection, .. } => LaunchReason::InboundData {
                connection: connection.clone(),
            },
            Self::Alarm { .. } => LaunchReason::Alarm,
        }
    }

    fn launch_request(&self) -> LaunchRequest {
        LaunchRequest {
            suite: self.suite().clone(),
            app_class: Some(self.app_class().clone()),
            reason: self.reason(),
        }
    }
}

/// Where refused or already-consumed events go back to.
#[async_trait]
pub trait PushRegistry: Send + Sync {
    /// Hand `event` back; the registry decides whether to keep or drop it.
    async fn check_in(&self, event: &InterruptEvent);
}

/// Push registry that only logs what it is handed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardingPushRegistry;

#[async_trait]
impl PushRegistry for DiscardingPushRegistry {
    async fn check_in(&self, event: &InterruptEvent) {
        debug!(suite = %event.suite(), class = %event.app_class(), "Event checked in and dropped");
    }
}

/// The suite currently being scheduled.
#[derive(Clone)]
pub struct RunningSuite {
    /// Suite description.
    pub info: SuiteInfo,
    /// Scheduler running it.
    pub scheduler: Scheduler,
    /// Its security context for this run.
    pub security: Arc<SecurityContext>,
}

impl std::fmt::Debug for RunningSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningSuite")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// How an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbitrationOutcome {
    /// Nothing was running, or the incumbent agreed to exit; the launch is
    /// queued.
    Queued,
    /// The target class is already running in the current suite and was
    /// handed the event.
    Delivered,
    /// The target belongs to the running suite; a new instance was
    /// registered with its scheduler.
    LaunchedInRunningSuite(RecordId),
    /// The incumbent refused to be interrupted.
    Denied(DenialReason),
}

/// Decides whether external events may preempt the running suite.
pub struct InterruptArbiter {
    running: Mutex<Option<RunningSuite>>,
    queue: Arc<SuiteQueue>,
    apps: Arc<AppRegistry>,
    push: Arc<dyn PushRegistry>,
}

impl std::fmt::Debug for InterruptArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptArbiter")
            .field("running", &self.running_suite().map(|r| r.info.id))
            .finish_non_exhaustive()
    }
}

impl InterruptArbiter {
    /// Create an arbiter queueing launches on `queue`.
    #[must_use]
    pub fn new(
        queue: Arc<SuiteQueue>,
        apps: Arc<AppRegistry>,
        push: Arc<dyn PushRegistry>,
    ) -> Self {
        Self {
            running: Mutex::new(None),
            queue,
            apps,
            push,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<RunningSuite>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that `suite` is now being scheduled.
    pub fn set_running(&self, suite: RunningSuite) {
        *self.lock() = Some(suite);
    }

    /// Record that no suite is being scheduled.
    pub fn clear_running(&self) {
        *self.lock() = None;
    }

    /// The suite being scheduled, if any.
    #[must_use]
    pub fn running_suite(&self) -> Option<RunningSuite> {
        self.lock().clone()
    }

    /// Arbitrate `event`.
    ///
    /// May wait on a permission question in the running suite.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownAppClass`] when a same-suite launch names
    /// a class without a constructor, and [`KernelError::Approval`] for
    /// permission failures other than a denial.
    pub async fn handle(&self, event: InterruptEvent) -> KernelResult<ArbitrationOutcome> {
        let ctx = RunContext::new("arbiter")
            .with_suite(event.suite().as_str())
            .with_operation("interrupt");
        self.arbitrate(event).instrument(ctx.span()).await
    }

    async fn arbitrate(&self, event: InterruptEvent) -> KernelResult<ArbitrationOutcome> {
        let Some(running) = self.running_suite() else {
            debug!(suite = %event.suite(), "No suite running, queueing launch");
            self.queue.push(event.launch_request());
            return Ok(ArbitrationOutcome::Queued);
        };

        if running.info.id == event.suite().as_str() {
            return self.deliver_to_running(&running, &event).await;
        }

        let question = format!(
            "{} wants to start. Exit {}?",
            event.suite(),
            running.info.name
        );
        match running
            .security
            .check_for_permission(event.capability(), &question)
            .await
        {
            Ok(()) => {
                // Queue before shutting down so the host loop finds the
                // launch when the incumbent's run ends.
                self.queue.push(event.launch_request());
                if self.is_current(&running) {
                    info!(
                        intruder = %event.suite(),
                        incumbent = %running.info.id,
                        "Interrupt granted, shutting down running suite"
                    );
                    running.scheduler.shutdown();
                } else {
                    info!(
                        intruder = %event.suite(),
                        incumbent = %running.info.id,
                        "Interrupt granted after the incumbent ended, queueing only"
                    );
                }
                Ok(ArbitrationOutcome::Queued)
            },
            Err(e) => match e.denial_reason() {
                Some(reason) => {
                    info!(
                        intruder = %event.suite(),
                        incumbent = %running.info.id,
                        %reason,
                        "Interrupt refused"
                    );
                    self.push.check_in(&event).await;
                    Ok(ArbitrationOutcome::Denied(reason))
                },
                None => Err(KernelError::Approval(e)),
            },
        }
    }

    /// Whether `running` is still the run in progress. Each run gets its own
    /// security context, so a later run of the same suite does not match.
    fn is_current(&self, running: &RunningSuite) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|now| Arc::ptr_eq(&now.security, &running.security))
    }

    async fn deliver_to_running(
        &self,
        running: &RunningSuite,
        event: &InterruptEvent,
    ) -> KernelResult<ArbitrationOutcome> {
        let class = event.app_class();
        if running.scheduler.is_scheduled(class) {
            debug!(suite = %running.info.id, %class, "Target already running, delivering event");
            self.push.check_in(event).await;
            return Ok(ArbitrationOutcome::Delivered);
        }

        let ctx = LaunchContext {
            suite: running.info.clone(),
            class: class.clone(),
            security: Arc::clone(&running.security),
            reason: event.reason(),
        };
        let app = self.apps.create(&ctx)?;
        let id = running.scheduler.register(app, class.clone());
        debug!(suite = %running.info.id, %class, record = %id, "Launched into running suite");
        Ok(ArbitrationOutcome::LaunchedInRunningSuite(id))
    }
}
