//! Suite command - install suites and edit their permissions.

use colored::Colorize;
use warden_capabilities::{Capability, PermissionLevel};
use warden_kernel::{Host, SuiteId};

use super::cli_manifest;
use crate::theme::Theme;

/// Install `id` into `domain`.
pub(crate) async fn install(
    host: &Host,
    id: SuiteId,
    domain: &str,
    trusted: bool,
) -> anyhow::Result<()> {
    let settings = host.install_suite(&cli_manifest(id.clone()), domain, trusted).await?;
    if settings.domain != domain {
        println!(
            "{}",
            Theme::warning(&format!(
                "domain '{domain}' is not defined; bound to '{}'",
                settings.domain
            ))
        );
    }
    println!(
        "{}",
        Theme::success(&format!("Installed {id} into {}", settings.domain))
    );
    Ok(())
}

/// List installed suites with their domain.
pub(crate) async fn list(host: &Host) -> anyhow::Result<()> {
    let suites = host.installed_suites().await?;
    if suites.is_empty() {
        println!("{}", Theme::info("No suites installed"));
        return Ok(());
    }

    println!("\n{}", Theme::header("Installed Suites"));
    println!("{:<32} {:<16} {}", "ID".dimmed(), "DOMAIN".dimmed(), "TRUSTED".dimmed());
    println!("{}", Theme::separator());
    for id in suites {
        let settings = host.settings(&id).await?;
        println!(
            "{:<32} {:<16} {}",
            id.as_str(),
            settings.domain,
            if settings.trusted { "yes" } else { "no" }
        );
    }
    println!();
    Ok(())
}

/// Remove `id`.
pub(crate) async fn uninstall(host: &Host, id: &SuiteId) -> anyhow::Result<()> {
    if host.uninstall_suite(id).await? {
        println!("{}", Theme::success(&format!("Removed {id}")));
    } else {
        println!("{}", Theme::info(&format!("{id} is not installed")));
    }
    Ok(())
}

/// Print the current and maximum level of every capability.
pub(crate) async fn permissions(host: &Host, id: &SuiteId) -> anyhow::Result<()> {
    let settings = host.settings(id).await?;

    println!(
        "\n{} {}",
        Theme::header(id.as_str()),
        Theme::dimmed(&format!("({})", settings.domain))
    );
    println!(
        "{:<22} {:<16} {}",
        "CAPABILITY".dimmed(),
        "CURRENT".dimmed(),
        "MAXIMUM".dimmed()
    );
    println!("{}", Theme::separator());
    for cap in Capability::ALL {
        let (Some(current), Some(maximum)) = (
            settings.current.get(cap.index()),
            settings.maximum.get(cap.index()),
        ) else {
            continue;
        };
        println!(
            "{:<22} {} {}",
            cap.name(),
            Theme::level(*current),
            Theme::level(*maximum)
        );
    }
    println!();
    Ok(())
}

/// Change one level, as the settings screen would.
pub(crate) async fn set(
    host: &Host,
    id: &SuiteId,
    capability: Capability,
    level: PermissionLevel,
) -> anyhow::Result<()> {
    host.set_permission(id, capability, level).await?;
    println!(
        "{}",
        Theme::success(&format!("{id}: {capability} set to {level}"))
    );
    Ok(())
}
