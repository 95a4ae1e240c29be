//! Demo command - run a small built-in suite against the terminal dialog.
//!
//! The demo application asks for `net.http` once and exits. Run it a few
//! times in different domains to see how the answers stick.

use std::sync::Arc;

use async_trait::async_trait;
use warden_approval::SecurityContext;
use warden_capabilities::Capability;
use warden_kernel::{AppRegistry, Host, HostExit, LaunchContext, LaunchRequest, SuiteId, SuiteManifest};
use warden_scheduler::{AppError, AppHandle, AppResult, Application};

use crate::theme::Theme;

/// Class id of the built-in demo application.
pub(crate) const DEMO_CLASS: &str = "demo";

const DEMO_SUITE: &str = "demo";
const DEMO_URL: &str = "http://example.com/";

/// Classes the CLI can launch.
pub(crate) fn app_registry() -> AppRegistry {
    AppRegistry::new().with(DEMO_CLASS, |ctx: &LaunchContext| {
        Arc::new(DemoApp {
            security: Arc::clone(&ctx.security),
        }) as Arc<dyn Application>
    })
}

/// Fetches a page, if allowed to, then exits.
struct DemoApp {
    security: Arc<SecurityContext>,
}

#[async_trait]
impl Application for DemoApp {
    async fn start(&self, handle: &AppHandle) -> AppResult<()> {
        match self
            .security
            .check_for_permission(Capability::NetHttp, DEMO_URL)
            .await
        {
            Ok(()) => println!("{}", Theme::success(&format!("Fetched {DEMO_URL}"))),
            Err(e) => match e.denial_reason() {
                Some(reason) => println!(
                    "{}",
                    Theme::warning(&format!("Could not fetch {DEMO_URL}: {reason}"))
                ),
                None => return Err(AppError::other(e)),
            },
        }
        handle.notify_destroyed();
        Ok(())
    }

    async fn destroy(&self, _handle: &AppHandle, _unconditional: bool) -> AppResult<()> {
        Ok(())
    }
}

/// Install the demo suite into `domain` unless it already lives there.
async fn ensure_installed(host: &Host, domain: &str) -> anyhow::Result<SuiteId> {
    let id = SuiteId::new(DEMO_SUITE)?;
    let bound = match host.settings(&id).await {
        Ok(settings) => {
            let wanted = host.policy().for_domain(domain)?;
            settings.domain == wanted.name()
        },
        Err(_) => false,
    };
    if !bound {
        let manifest = SuiteManifest::new(id.clone(), "Demo", DEMO_CLASS);
        let settings = host.install_suite(&manifest, domain, false).await?;
        println!(
            "{}",
            Theme::info(&format!("Installed demo suite into {}", settings.domain))
        );
    }
    Ok(id)
}

/// Run the demo suite until it exits or Ctrl-C is pressed.
pub(crate) async fn run(host: Arc<Host>, domain: &str) -> anyhow::Result<HostExit> {
    let id = ensure_installed(&host, domain).await?;

    let watcher = {
        let host = Arc::clone(&host);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!();
                println!("{}", Theme::warning("Shutting down"));
                host.shutdown();
            }
        })
    };
    let exit = host.run(LaunchRequest::user(id.clone())).await;
    watcher.abort();
    let exit = exit?;

    let settings = host.settings(&id).await?;
    if let Some(level) = settings.current.get(Capability::NetHttp.index()) {
        println!(
            "{} {}",
            Theme::dimmed("net.http is now"),
            Theme::level(*level)
        );
    }
    Ok(exit)
}
