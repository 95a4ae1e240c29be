//! Subcommand handlers.

pub(crate) mod demo;
pub(crate) mod policy;
pub(crate) mod suite;

use std::sync::Arc;

use anyhow::Context;
use warden_approval::PermissionDialog;
use warden_config::{Config, StorageBackend};
use warden_kernel::{Host, SuiteId, SuiteManifest};
use warden_storage::{KvStore, MemoryKvStore, SurrealKvStore};

/// A host plus the on-disk store it writes to, closed when the command ends.
pub(crate) struct CliHost {
    pub(crate) host: Arc<Host>,
    disk: Option<Arc<SurrealKvStore>>,
}

impl CliHost {
    /// Build a host over the configured policy and settings backend.
    pub(crate) fn open(
        config: Config,
        dialog: Option<Arc<dyn PermissionDialog>>,
    ) -> anyhow::Result<Self> {
        let disk = match config.storage.backend {
            StorageBackend::Memory => None,
            StorageBackend::Surrealkv => {
                let dir = config
                    .storage
                    .resolved_data_dir()
                    .context("no data directory; set storage.data_dir")?;
                let path = dir.join("settings");
                let store = SurrealKvStore::open(&path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                Some(Arc::new(store))
            },
        };
        let store: Arc<dyn KvStore> = match &disk {
            Some(disk) => Arc::clone(disk) as Arc<dyn KvStore>,
            None => Arc::new(MemoryKvStore::new()),
        };

        let builder = Host::builder(demo::app_registry())
            .config(config)
            .store(store);
        let builder = match dialog {
            Some(dialog) => builder.dialog(dialog),
            None => builder,
        };
        Ok(Self {
            host: Arc::new(builder.build()?),
            disk,
        })
    }

    /// Flush the settings store.
    pub(crate) async fn close(self) -> anyhow::Result<()> {
        if let Some(disk) = self.disk {
            disk.close().await?;
        }
        Ok(())
    }
}

/// Manifest for suites installed from the command line. They all run the
/// built-in demo application.
pub(crate) fn cli_manifest(id: SuiteId) -> SuiteManifest {
    let name = id.to_string();
    SuiteManifest::new(id, name, demo::DEMO_CLASS)
}
