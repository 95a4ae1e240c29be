//! Policy command - inspect the domain policy.

use std::path::PathBuf;

use anyhow::bail;
use colored::Colorize;
use warden_capabilities::{Capability, DomainPolicyStore, INTERNAL_DOMAIN};
use warden_config::Config;
use warden_kernel::policy_store;

use crate::theme::Theme;

fn store_for(config: &Config, file: Option<PathBuf>) -> DomainPolicyStore {
    match file {
        Some(path) => DomainPolicyStore::from_path(path),
        None => policy_store(config),
    }
}

/// Parse the policy and list its domains.
pub(crate) fn check(config: &Config, file: Option<PathBuf>) -> anyhow::Result<()> {
    let store = store_for(config, file);
    let domains = store.domain_names()?;

    println!("\n{}", Theme::header("Policy"));
    println!("{}", Theme::dimmed(&format!("{:?}", store.source())));
    println!("{}", Theme::separator());
    for domain in &domains {
        println!("  {domain}");
    }
    println!("  {}", format!("{INTERNAL_DOMAIN} (built in)").dimmed());
    println!();

    if domains.iter().any(|d| d == store.fallback()) {
        println!("{}", Theme::success(&format!("{} domains", domains.len())));
    } else {
        println!(
            "{}",
            Theme::warning(&format!(
                "fallback domain '{}' is not defined; suites outside the listed domains cannot start",
                store.fallback()
            ))
        );
    }
    Ok(())
}

/// Print ceiling and default level of every capability in `domain`.
pub(crate) fn show(config: &Config, domain: &str) -> anyhow::Result<()> {
    let store = policy_store(config);
    let permissions = if domain == INTERNAL_DOMAIN {
        store.for_domain(domain)?
    } else {
        match store.lookup(domain)? {
            Some(permissions) => permissions,
            None => bail!(
                "unknown domain '{domain}' (known: {})",
                store.domain_names()?.join(", ")
            ),
        }
    };

    println!("\n{}", Theme::header(&format!("Domain {domain}")));
    println!(
        "{:<22} {:<16} {}",
        "CAPABILITY".dimmed(),
        "MAXIMUM".dimmed(),
        "DEFAULT".dimmed()
    );
    println!("{}", Theme::separator());
    for cap in Capability::ALL {
        println!(
            "{:<22} {} {}",
            cap.name(),
            Theme::level(permissions.maximum(cap)),
            Theme::level(permissions.default_level(cap))
        );
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.txt");
        std::fs::write(&path, "domain: broken\nallow: net.gopher\n").unwrap();
        assert!(check(&Config::default(), Some(path)).is_err());
    }

    #[test]
    fn test_show_embedded_domains() {
        let config = Config::default();
        assert!(show(&config, "untrusted").is_ok());
        assert!(show(&config, INTERNAL_DOMAIN).is_ok());
        assert!(show(&config, "nobody").is_err());
    }
}
