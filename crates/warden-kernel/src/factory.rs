//! Application factory table.
//!
//! Applications are created by registered constructors keyed by class id.
//! A suite's classes are resolved against this table when the suite is
//! installed, so a launch never fails on a missing class.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use warden_approval::SecurityContext;
use warden_scheduler::{AppClassId, Application, SuiteInfo};

use crate::error::{KernelError, KernelResult};
use crate::queue::LaunchReason;
use crate::suite::SuiteManifest;

/// What a constructor gets to build an application instance.
#[derive(Clone)]
pub struct LaunchContext {
    /// Suite being run.
    pub suite: SuiteInfo,
    /// Class to instantiate.
    pub class: AppClassId,
    /// The suite's permission state for this run.
    pub security: Arc<SecurityContext>,
    /// Why the instance is launched.
    pub reason: LaunchReason,
}

impl fmt::Debug for LaunchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchContext")
            .field("suite", &self.suite.id)
            .field("class", &self.class)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// Constructor of one application class.
pub type AppFactory = Arc<dyn Fn(&LaunchContext) -> Arc<dyn Application> + Send + Sync>;

/// Class id → constructor.
#[derive(Default, Clone)]
pub struct AppRegistry {
    factories: HashMap<AppClassId, AppFactory>,
}

impl fmt::Debug for AppRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRegistry")
            .field("classes", &self.classes())
            .finish()
    }
}

impl AppRegistry {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constructor of `class`, replacing any previous one.
    pub fn register<F>(&mut self, class: impl Into<AppClassId>, factory: F)
    where
        F: Fn(&LaunchContext) -> Arc<dyn Application> + Send + Sync + 'static,
    {
        self.factories.insert(class.into(), Arc::new(factory));
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with<F>(mut self, class: impl Into<AppClassId>, factory: F) -> Self
    where
        F: Fn(&LaunchContext) -> Arc<dyn Application> + Send + Sync + 'static,
    {
        self.register(class, factory);
        self
    }

    /// Whether `class` has a constructor.
    #[must_use]
    pub fn contains(&self, class: &AppClassId) -> bool {
        self.factories.contains_key(class)
    }

    /// Registered classes, sorted.
    #[must_use]
    pub fn classes(&self) -> Vec<AppClassId> {
        let mut classes: Vec<_> = self.factories.keys().cloned().collect();
        classes.sort();
        classes
    }

    /// Check every class of `manifest` against the table.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidManifest`] for an inconsistent manifest
    /// and [`KernelError::UnknownAppClass`] for the first class without a
    /// constructor.
    pub fn resolve(&self, manifest: &SuiteManifest) -> KernelResult<()> {
        manifest.validate()?;
        match manifest.classes.iter().find(|c| !self.contains(c)) {
            Some(class) => Err(KernelError::UnknownAppClass {
                suite: manifest.id.to_string(),
                class: class.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Build an instance of `ctx.class`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::UnknownAppClass`] if the class has no
    /// constructor.
    pub fn create(&self, ctx: &LaunchContext) -> KernelResult<Arc<dyn Application>> {
        let factory = self
            .factories
            .get(&ctx.class)
            .ok_or_else(|| KernelError::UnknownAppClass {
                suite: ctx.suite.id.clone(),
                class: ctx.class.clone(),
            })?;
        Ok(factory(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::SuiteId;
    use warden_approval::HeadlessDialog;
    use warden_test::ScriptedApp;

    fn ctx(class: &str) -> LaunchContext {
        LaunchContext {
            suite: SuiteInfo::new("chess", "Chess", "untrusted"),
            class: class.into(),
            security: Arc::new(SecurityContext::internal(Arc::new(HeadlessDialog))),
            reason: LaunchReason::User,
        }
    }

    fn registry() -> AppRegistry {
        AppRegistry::new()
            .with("board", |_| ScriptedApp::exiting() as Arc<dyn Application>)
            .with("clock", |_| ScriptedApp::exiting() as Arc<dyn Application>)
    }

    #[test]
    fn test_resolve_manifest() {
        let apps = registry();
        let id = SuiteId::new("chess").unwrap();

        let ok = SuiteManifest::new(id.clone(), "Chess", "board").with_class("clock");
        assert!(apps.resolve(&ok).is_ok());

        let missing = SuiteManifest::new(id, "Chess", "board").with_class("engine");
        match apps.resolve(&missing) {
            Err(KernelError::UnknownAppClass { class, .. }) => {
                assert_eq!(class, AppClassId::from("engine"));
            },
            other => panic!("expected unknown class, got {other:?}"),
        }
    }

    #[test]
    fn test_create() {
        let apps = registry();
        assert!(apps.create(&ctx("board")).is_ok());
        assert!(matches!(
            apps.create(&ctx("nope")),
            Err(KernelError::UnknownAppClass { .. })
        ));
        assert_eq!(
            apps.classes(),
            vec![AppClassId::from("board"), AppClassId::from("clock")]
        );
    }
}
