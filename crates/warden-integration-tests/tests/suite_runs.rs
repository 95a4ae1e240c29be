//! Suite runs through the host: settings persistence and policy loading.

use std::sync::Arc;

use warden_approval::PromptChoice;
use warden_capabilities::{Capability, DomainPolicyStore, PermissionLevel};
use warden_kernel::{
    AppRegistry, Host, HostExit, KernelError, LaunchContext, LaunchRequest, SettingsStore,
    SuiteId, SuiteManifest, SuiteSettings,
};
use warden_scheduler::Application;
use warden_storage::{KvStore, SurrealKvStore};
use warden_test::{ScriptedApp, ScriptedDialog, TEST_POLICY, test_dir, test_policy_store};

fn fetcher_registry() -> AppRegistry {
    AppRegistry::new().with("fetcher", |ctx: &LaunchContext| {
        ScriptedApp::requesting(Arc::clone(&ctx.security), Capability::NetHttp)
            as Arc<dyn Application>
    })
}

fn manifest() -> SuiteManifest {
    SuiteManifest::new(SuiteId::new("fetch").unwrap(), "Fetch", "fetcher")
}

fn host_on(store: Arc<dyn KvStore>, dialog: Arc<ScriptedDialog>) -> Host {
    Host::builder(fetcher_registry())
        .policy(test_policy_store())
        .store(store)
        .dialog(dialog)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_settings_survive_reopening_the_store() {
    let dir = test_dir();
    let id = SuiteId::new("chess").unwrap();
    let domain = test_policy_store().for_domain("identified").unwrap();
    let mut settings = SuiteSettings::new(id.clone(), &domain, true);
    settings.current[Capability::NetHttp.index()] = PermissionLevel::BlanketGranted;
    settings.current[Capability::PushInterrupt.index()] = PermissionLevel::Deny;
    settings.push_interrupt = PermissionLevel::Deny;

    {
        let disk = Arc::new(SurrealKvStore::open(dir.path()).unwrap());
        let store = SettingsStore::new(disk.clone()).unwrap();
        store.save(&settings).await.unwrap();
        disk.close().await.unwrap();
    }

    let disk = Arc::new(SurrealKvStore::open(dir.path()).unwrap());
    let store = SettingsStore::new(disk).unwrap();
    let loaded = store.load(&id).await.unwrap().unwrap();
    assert_eq!(loaded.domain, "identified");
    assert!(loaded.trusted);
    assert_eq!(loaded.push_interrupt, PermissionLevel::Deny);
    assert_eq!(loaded.current, settings.current);
    assert_eq!(loaded.maximum, settings.maximum);
    assert_eq!(store.list().await.unwrap(), vec![id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blanket_grant_survives_a_restart() {
    let dir = test_dir();
    let id = manifest().id;
    let dialog = Arc::new(ScriptedDialog::new().with_answer(PromptChoice::AllowAlways));

    {
        let disk = Arc::new(SurrealKvStore::open(dir.path()).unwrap());
        let host = host_on(disk.clone(), dialog.clone());
        host.install_suite(&manifest(), "identified", false).await.unwrap();
        assert_eq!(
            host.run(LaunchRequest::user(id.clone())).await.unwrap(),
            HostExit::Completed
        );
        disk.close().await.unwrap();
    }
    assert_eq!(dialog.questions().len(), 1);

    let disk = Arc::new(SurrealKvStore::open(dir.path()).unwrap());
    let host = host_on(disk, dialog.clone());
    let settings = host.settings(&id).await.unwrap();
    assert_eq!(
        settings.current[Capability::NetHttp.index()],
        PermissionLevel::BlanketGranted
    );

    host.run(LaunchRequest::user(id)).await.unwrap();
    assert_eq!(dialog.questions().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_answers_are_not_carried_into_the_next_run() {
    let dialog = Arc::new(
        ScriptedDialog::new()
            .with_answer(PromptChoice::AllowSession)
            .with_answer(PromptChoice::AllowSession),
    );
    let host = host_on(Arc::new(warden_storage::MemoryKvStore::new()), dialog.clone());
    let id = manifest().id;
    host.install_suite(&manifest(), "untrusted", false).await.unwrap();

    host.run(LaunchRequest::user(id.clone())).await.unwrap();
    host.run(LaunchRequest::user(id.clone())).await.unwrap();

    assert_eq!(dialog.questions().len(), 2);
    let settings = host.settings(&id).await.unwrap();
    assert_eq!(
        settings.current[Capability::NetHttp.index()],
        PermissionLevel::Session
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_policy_file_fixed_while_the_host_runs() {
    let dir = test_dir();
    let path = dir.path().join("policy.txt");
    std::fs::write(&path, format!("{TEST_POLICY}\nbogus: net.http\n")).unwrap();

    let dialog = Arc::new(ScriptedDialog::new());
    let host = Host::builder(fetcher_registry())
        .policy(DomainPolicyStore::from_path(&path))
        .store(Arc::new(warden_storage::MemoryKvStore::new()))
        .dialog(dialog.clone())
        .build()
        .unwrap();

    assert!(matches!(
        host.install_suite(&manifest(), "untrusted", false).await,
        Err(KernelError::Policy(_))
    ));

    std::fs::write(&path, TEST_POLICY).unwrap();
    host.install_suite(&manifest(), "untrusted", false).await.unwrap();
    assert_eq!(
        host.run(LaunchRequest::user(manifest().id)).await.unwrap(),
        HostExit::Completed
    );
    assert_eq!(dialog.questions().len(), 1);
}
