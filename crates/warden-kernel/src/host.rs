//! The host command loop.
//!
//! The host owns everything a suite run needs: policy, settings storage,
//! the application factory table, the display, the dialog and a single
//! scheduler. [`Host::run`] works through the launch queue one suite at a
//! time until it is empty or the host is shut down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{Instrument, debug, info, warn};
use warden_approval::{HeadlessDialog, PermissionDialog, SecurityContext};
use warden_capabilities::{Capability, DomainPolicyStore, PermissionLevel};
use warden_config::{Config, StorageBackend, StorageSection};
use warden_scheduler::{AppClassId, Display, LogDisplay, Scheduler};
use warden_storage::{KvStore, MemoryKvStore, ScopedKvStore, StorageError, SurrealKvStore};
use warden_telemetry::RunContext;

use crate::arbiter::{DiscardingPushRegistry, InterruptArbiter, PushRegistry, RunningSuite};
use crate::error::{KernelError, KernelResult};
use crate::factory::{AppRegistry, LaunchContext};
use crate::queue::{LaunchReason, LaunchRequest, SuiteQueue};
use crate::settings::{SettingsStore, SuiteSettings};
use crate::suite::{SuiteId, SuiteManifest};

/// Storage namespace of installed manifests.
pub const MANIFEST_NAMESPACE: &str = "suites:manifests";

/// How [`Host::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostExit {
    /// The queue ran dry after suites exited on their own.
    Completed,
    /// A run was shut down and nothing was left to launch.
    ShutDown,
}

/// Open the settings backend `storage` names.
///
/// # Errors
///
/// Returns a storage error if the on-disk store cannot be opened or no data
/// directory can be determined.
pub fn open_store(storage: &StorageSection) -> KernelResult<Arc<dyn KvStore>> {
    match storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryKvStore::new())),
        StorageBackend::Surrealkv => {
            let dir = storage.resolved_data_dir().ok_or_else(|| {
                StorageError::Connection("no data directory could be determined".to_string())
            })?;
            Ok(Arc::new(SurrealKvStore::open(dir.join("settings"))?))
        },
    }
}

/// Build the policy store `config` describes.
#[must_use]
pub fn policy_store(config: &Config) -> DomainPolicyStore {
    let store = match &config.policy.path {
        Some(path) => DomainPolicyStore::from_path(path.clone()),
        None => DomainPolicyStore::embedded(),
    };
    store.with_fallback(config.policy.fallback_domain.clone())
}

/// Assembles a [`Host`].
pub struct HostBuilder {
    config: Config,
    apps: AppRegistry,
    policy: Option<DomainPolicyStore>,
    store: Option<Arc<dyn KvStore>>,
    display: Option<Arc<dyn Display>>,
    dialog: Option<Arc<dyn PermissionDialog>>,
    push: Option<Arc<dyn PushRegistry>>,
}

impl HostBuilder {
    /// Use `config` instead of the defaults.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use this policy store instead of the one the config names.
    #[must_use]
    pub fn policy(mut self, policy: DomainPolicyStore) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Use this key-value store instead of the configured backend.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Display collaborator. Defaults to [`LogDisplay`].
    #[must_use]
    pub fn display(mut self, display: Arc<dyn Display>) -> Self {
        self.display = Some(display);
        self
    }

    /// Dialog collaborator. Defaults to [`HeadlessDialog`].
    #[must_use]
    pub fn dialog(mut self, dialog: Arc<dyn PermissionDialog>) -> Self {
        self.dialog = Some(dialog);
        self
    }

    /// Where refused interrupt events go. Defaults to
    /// [`DiscardingPushRegistry`].
    #[must_use]
    pub fn push_registry(mut self, push: Arc<dyn PushRegistry>) -> Self {
        self.push = Some(push);
        self
    }

    /// Build the host.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the settings backend cannot be opened.
    pub fn build(self) -> KernelResult<Host> {
        let store = match self.store {
            Some(store) => store,
            None => open_store(&self.config.storage)?,
        };
        let policy = self.policy.unwrap_or_else(|| policy_store(&self.config));
        let apps = Arc::new(self.apps);
        let queue = Arc::new(SuiteQueue::new());
        let push = self
            .push
            .unwrap_or_else(|| Arc::new(DiscardingPushRegistry));
        let display = self.display.unwrap_or_else(|| Arc::new(LogDisplay));

        Ok(Host {
            settings: SettingsStore::new(Arc::clone(&store))?,
            manifests: ScopedKvStore::new(store, MANIFEST_NAMESPACE)?,
            policy: Arc::new(policy),
            arbiter: Arc::new(InterruptArbiter::new(
                Arc::clone(&queue),
                Arc::clone(&apps),
                push,
            )),
            scheduler: Scheduler::new(display),
            dialog: self.dialog.unwrap_or_else(|| Arc::new(HeadlessDialog)),
            config: self.config,
            apps,
            queue,
            stopping: AtomicBool::new(false),
        })
    }
}

/// A launch resolved against the installed suites.
struct PreparedRun {
    manifest: SuiteManifest,
    settings: SuiteSettings,
    class: AppClassId,
    reason: LaunchReason,
}

/// Runs installed suites one after another.
pub struct Host {
    config: Config,
    policy: Arc<DomainPolicyStore>,
    settings: SettingsStore,
    manifests: ScopedKvStore,
    apps: Arc<AppRegistry>,
    dialog: Arc<dyn PermissionDialog>,
    scheduler: Scheduler,
    arbiter: Arc<InterruptArbiter>,
    queue: Arc<SuiteQueue>,
    stopping: AtomicBool,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("scheduler", &self.scheduler)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Host {
    /// Start assembling a host around the given application classes.
    #[must_use]
    pub fn builder(apps: AppRegistry) -> HostBuilder {
        HostBuilder {
            config: Config::default(),
            apps,
            policy: None,
            store: None,
            display: None,
            dialog: None,
            push: None,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Policy store.
    #[must_use]
    pub fn policy(&self) -> &DomainPolicyStore {
        &self.policy
    }

    /// The scheduler every suite runs on.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Interrupt arbiter; hand it inbound-data and alarm events.
    #[must_use]
    pub fn arbiter(&self) -> &Arc<InterruptArbiter> {
        &self.arbiter
    }

    /// Launch queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<SuiteQueue> {
        &self.queue
    }

    /// Install `manifest` into `domain`, replacing any previous install.
    ///
    /// Every class must have a constructor and the policy must resolve.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownAppClass`] or
    /// [`KernelError::InvalidManifest`] for a bad manifest,
    /// [`KernelError::Policy`] when no domain can be resolved, or a storage
    /// error.
    pub async fn install_suite(
        &self,
        manifest: &SuiteManifest,
        domain: &str,
        trusted: bool,
    ) -> KernelResult<SuiteSettings> {
        self.apps.resolve(manifest)?;
        let permissions = self.policy.for_domain(domain)?;
        let settings = SuiteSettings::new(manifest.id.clone(), &permissions, trusted);

        self.settings.save(&settings).await?;
        self.manifests
            .set(manifest.id.as_str(), serde_json::to_vec(manifest)?)
            .await?;
        info!(
            suite = %manifest.id,
            requested = domain,
            domain = %settings.domain,
            trusted,
            "Suite installed"
        );
        Ok(settings)
    }

    /// Remove a suite's settings and manifest. Returns `true` if anything
    /// was removed.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn uninstall_suite(&self, suite: &SuiteId) -> KernelResult<bool> {
        let had_settings = self.settings.remove(suite).await?;
        let had_manifest = self.manifests.delete(suite.as_str()).await?;
        if had_settings || had_manifest {
            info!(suite = %suite, "Suite uninstalled");
        }
        Ok(had_settings || had_manifest)
    }

    /// Installed suite ids, sorted.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn installed_suites(&self) -> KernelResult<Vec<SuiteId>> {
        self.settings.list().await
    }

    /// Manifest of an installed suite.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownSuite`] if it is not installed.
    pub async fn manifest(&self, suite: &SuiteId) -> KernelResult<SuiteManifest> {
        let bytes = self
            .manifests
            .get(suite.as_str())
            .await?
            .ok_or_else(|| KernelError::UnknownSuite(suite.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Settings of an installed suite.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownSuite`] if it is not installed.
    pub async fn settings(&self, suite: &SuiteId) -> KernelResult<SuiteSettings> {
        self.settings
            .load(suite)
            .await?
            .ok_or_else(|| KernelError::UnknownSuite(suite.to_string()))
    }

    /// Change a permission level from the settings screen and save it.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Approval`] if the level is above the ceiling
    /// or conflicts with another blanket grant, or a lookup/storage error.
    pub async fn set_permission(
        &self,
        suite: &SuiteId,
        capability: Capability,
        level: PermissionLevel,
    ) -> KernelResult<SuiteSettings> {
        let manifest = self.manifest(suite).await?;
        let mut settings = self.settings(suite).await?;
        let context = self.security_context(&manifest, &settings);

        context.set_level(capability, level)?;
        settings.update_from(&context);
        self.settings.save(&settings).await?;
        Ok(settings)
    }

    fn security_context(&self, manifest: &SuiteManifest, settings: &SuiteSettings) -> SecurityContext {
        let context = SecurityContext::new(
            manifest.id.as_str(),
            manifest.name.clone(),
            settings.domain.clone(),
            settings.vector(),
            Arc::clone(&self.dialog),
        );
        match self.config.security.prompt_timeout() {
            Some(timeout) => context.with_prompt_timeout(timeout),
            None => context,
        }
    }

    /// Queue a launch for the running [`run`](Self::run) loop.
    pub fn enqueue(&self, request: LaunchRequest) {
        self.queue.push(request);
    }

    /// Run `first`, then every queued launch, until the queue is empty.
    ///
    /// Launches queued behind `first` that cannot be prepared (uninstalled
    /// suite, unknown class) are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if `first` cannot be prepared, if the policy cannot
    /// be loaded, or if settings cannot be saved after a run.
    pub async fn run(&self, first: LaunchRequest) -> KernelResult<HostExit> {
        let mut next = Some(self.prepare(first).await?);

        loop {
            let prepared = match next.take() {
                Some(prepared) => prepared,
                None => {
                    let Some(request) = self.queue.pop() else {
                        info!("Launch queue empty");
                        return Ok(HostExit::Completed);
                    };
                    match self.prepare(request).await {
                        Ok(prepared) => prepared,
                        Err(e) => {
                            warn!(error = %e, "Skipping queued launch");
                            continue;
                        },
                    }
                },
            };

            if self.stopping.load(Ordering::Acquire) {
                return Ok(HostExit::ShutDown);
            }
            let normal_exit = self.run_suite(prepared).await?;
            if self.stopping.load(Ordering::Acquire) || (!normal_exit && self.queue.is_empty()) {
                info!("Host shut down");
                return Ok(HostExit::ShutDown);
            }
        }
    }

    /// Stop the host: drop queued launches and shut the running suite down.
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::Release);
        let dropped = self.queue.clear();
        info!(dropped, "Host shutdown requested");
        self.scheduler.shutdown();
    }

    async fn prepare(&self, request: LaunchRequest) -> KernelResult<PreparedRun> {
        let manifest = self.manifest(&request.suite).await?;
        let settings = self.settings(&request.suite).await?;
        let class = request
            .app_class
            .unwrap_or_else(|| manifest.initial.clone());
        if !manifest.contains(&class) {
            return Err(KernelError::UnknownAppClass {
                suite: manifest.id.to_string(),
                class,
            });
        }
        Ok(PreparedRun {
            manifest,
            settings,
            class,
            reason: request.reason,
        })
    }

    async fn run_suite(&self, prepared: PreparedRun) -> KernelResult<bool> {
        let ctx = RunContext::new("host")
            .with_suite(prepared.manifest.id.as_str())
            .with_operation("schedule");
        let span = ctx.span();
        let normal_exit = self.run_suite_inner(prepared).instrument(span).await?;
        info!(
            suite = ctx.suite.as_deref().unwrap_or_default(),
            normal_exit,
            elapsed_ms = ctx.elapsed_ms(),
            "Suite run finished"
        );
        Ok(normal_exit)
    }

    async fn run_suite_inner(&self, prepared: PreparedRun) -> KernelResult<bool> {
        let PreparedRun {
            manifest,
            mut settings,
            class,
            reason,
        } = prepared;

        // No suite starts with undefined permissions.
        self.policy.for_domain(&settings.domain)?;

        let info = manifest.info(settings.domain.clone());
        let security = Arc::new(self.security_context(&manifest, &settings));
        security.begin_session();

        let launch = LaunchContext {
            suite: info.clone(),
            class: class.clone(),
            security: Arc::clone(&security),
            reason,
        };
        let app = self.apps.create(&launch)?;
        self.scheduler.register(app, class);
        self.arbiter.set_running(RunningSuite {
            info: info.clone(),
            scheduler: self.scheduler.clone(),
            security: Arc::clone(&security),
        });

        let outcome = self.scheduler.schedule(&info).await;
        self.arbiter.clear_running();
        self.persist(&mut settings, &security).await?;
        Ok(outcome?)
    }

    async fn persist(&self, settings: &mut SuiteSettings, security: &SecurityContext) -> KernelResult<()> {
        if !security.is_dirty() {
            return Ok(());
        }
        if !self.config.security.persist_on_grant {
            debug!(suite = %settings.suite_id, "Permission changes kept for this run only");
            return Ok(());
        }
        settings.update_from(security);
        self.settings.save(settings).await?;
        security.mark_clean();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_approval::PromptChoice;
    use warden_scheduler::Application;
    use warden_test::{RecordingDisplay, ScriptedApp, ScriptedDialog};

    fn apps() -> AppRegistry {
        AppRegistry::new()
            .with("hello", |_| ScriptedApp::exiting() as Arc<dyn Application>)
            .with("web", |ctx: &LaunchContext| {
                ScriptedApp::requesting(Arc::clone(&ctx.security), Capability::NetHttp)
                    as Arc<dyn Application>
            })
    }

    fn host(dialog: Arc<ScriptedDialog>) -> Host {
        Host::builder(apps())
            .store(Arc::new(MemoryKvStore::new()))
            .display(Arc::new(RecordingDisplay::new()))
            .dialog(dialog)
            .build()
            .unwrap()
    }

    fn id(s: &str) -> SuiteId {
        SuiteId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_install_resolves_domain_and_classes() {
        let host = host(Arc::new(ScriptedDialog::new()));

        let settings = host
            .install_suite(&SuiteManifest::new(id("hello"), "Hello", "hello"), "nowhere", false)
            .await
            .unwrap();
        assert_eq!(settings.domain, "untrusted");
        assert_eq!(host.installed_suites().await.unwrap(), vec![id("hello")]);
        assert_eq!(host.manifest(&id("hello")).await.unwrap().name, "Hello");

        let bad = SuiteManifest::new(id("bad"), "Bad", "missing");
        assert!(matches!(
            host.install_suite(&bad, "untrusted", false).await,
            Err(KernelError::UnknownAppClass { .. })
        ));
        assert!(host.settings(&id("bad")).await.is_err());
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let host = host(Arc::new(ScriptedDialog::new()));
        host.install_suite(&SuiteManifest::new(id("hello"), "Hello", "hello"), "untrusted", false)
            .await
            .unwrap();

        let exit = host.run(LaunchRequest::user(id("hello"))).await.unwrap();
        assert_eq!(exit, HostExit::Completed);
        assert!(host.arbiter().running_suite().is_none());
    }

    #[tokio::test]
    async fn test_run_unknown_suite_fails() {
        let host = host(Arc::new(ScriptedDialog::new()));
        assert!(matches!(
            host.run(LaunchRequest::user(id("ghost"))).await,
            Err(KernelError::UnknownSuite(_))
        ));
    }

    #[tokio::test]
    async fn test_blanket_grant_persists_across_runs() {
        let dialog = Arc::new(ScriptedDialog::new());
        let host = host(dialog.clone());
        host.install_suite(&SuiteManifest::new(id("web"), "Web", "web"), "identified", false)
            .await
            .unwrap();

        dialog.push(PromptChoice::AllowAlways);
        assert_eq!(
            host.run(LaunchRequest::user(id("web"))).await.unwrap(),
            HostExit::Completed
        );
        assert_eq!(dialog.questions().len(), 1);
        let saved = host.settings(&id("web")).await.unwrap();
        assert_eq!(
            saved.current[Capability::NetHttp.index()],
            PermissionLevel::BlanketGranted
        );

        assert_eq!(
            host.run(LaunchRequest::user(id("web"))).await.unwrap(),
            HostExit::Completed
        );
        assert_eq!(dialog.questions().len(), 1, "second run must not ask");
    }

    #[tokio::test]
    async fn test_set_permission_respects_ceiling() {
        let host = host(Arc::new(ScriptedDialog::new()));
        host.install_suite(&SuiteManifest::new(id("hello"), "Hello", "hello"), "untrusted", false)
            .await
            .unwrap();

        let settings = host
            .set_permission(&id("hello"), Capability::NetHttp, PermissionLevel::OneShot)
            .await
            .unwrap();
        assert_eq!(settings.current[Capability::NetHttp.index()], PermissionLevel::OneShot);

        assert!(matches!(
            host.set_permission(&id("hello"), Capability::NetHttp, PermissionLevel::BlanketGranted)
                .await,
            Err(KernelError::Approval(_))
        ));
    }

    #[tokio::test]
    async fn test_queued_launches_run_in_order() {
        let host = host(Arc::new(ScriptedDialog::new()));
        for name in ["one", "two"] {
            host.install_suite(&SuiteManifest::new(id(name), name, "hello"), "untrusted", false)
                .await
                .unwrap();
        }
        host.enqueue(LaunchRequest::user(id("ghost")));
        host.enqueue(LaunchRequest::user(id("two")));

        assert_eq!(
            host.run(LaunchRequest::user(id("one"))).await.unwrap(),
            HostExit::Completed
        );
        assert!(host.queue().is_empty());
    }
}
