//! Warden CLI - runtime supervisor for sandboxed application suites.
//!
//! Inspects the domain policy, installs suites and edits their permission
//! settings, and runs a built-in demo suite against a terminal dialog.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use warden_capabilities::{Capability, PermissionLevel};
use warden_config::Config;
use warden_kernel::{Host, HostExit, SuiteId};
use warden_telemetry::{LogConfig, LogFormat};

mod commands;
mod config_bridge;
mod dialog;
mod theme;

use commands::{CliHost, demo, policy, suite};
use dialog::TerminalDialog;
use theme::Theme;

/// Warden - runtime supervisor
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file layered over the user and system files
    #[arg(short, long, global = true, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format: pretty, compact, json or full
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the domain policy
    Policy {
        #[command(subcommand)]
        command: PolicyCommands,
    },

    /// Manage installed suites and their permissions
    Suite {
        #[command(subcommand)]
        command: SuiteCommands,
    },

    /// Run the built-in demo suite
    Demo {
        /// Domain to install the demo suite into
        #[arg(short, long, default_value = "untrusted")]
        domain: String,
    },
}

#[derive(Subcommand)]
enum PolicyCommands {
    /// Parse the policy and list its domains
    Check {
        /// Policy file to check instead of the configured one
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show ceilings and defaults of one domain
    Show {
        /// Domain name
        domain: String,
    },
}

#[derive(Subcommand)]
enum SuiteCommands {
    /// Install a suite into a domain
    Install {
        /// Suite id
        id: SuiteId,
        /// Domain to bind the suite to
        #[arg(short, long)]
        domain: String,
        /// Mark the suite as verified
        #[arg(long)]
        trusted: bool,
    },
    /// List installed suites
    List,
    /// Remove a suite and its settings
    Uninstall {
        /// Suite id
        id: SuiteId,
    },
    /// Print current and maximum permission levels
    Permissions {
        /// Suite id
        id: SuiteId,
    },
    /// Change one permission level
    Set {
        /// Suite id
        id: SuiteId,
        /// Capability name, e.g. `net.http`
        capability: Capability,
        /// Level: allow, blanket-granted, session, oneshot, deny or user-denied
        #[arg(value_parser = parse_level)]
        level: PermissionLevel,
    },
}

fn parse_level(label: &str) -> Result<PermissionLevel, String> {
    PermissionLevel::from_label(label).ok_or_else(|| format!("unknown permission level: {label}"))
}

fn log_config(cli: &Cli, config: Option<&Config>) -> LogConfig {
    let mut lc = match config {
        Some(cfg) => config_bridge::to_log_config(cfg),
        None => LogConfig::new("info").with_format(LogFormat::Compact),
    };
    if cli.verbose {
        "debug".clone_into(&mut lc.level);
    }
    if let Some(format) = &cli.log_format {
        match format.parse::<LogFormat>() {
            Ok(format) => lc.format = format,
            Err(e) => eprintln!("Ignoring --log-format: {e}"),
        }
    }
    lc
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(cli.config.as_deref());
    let log_config = log_config(&cli, loaded.as_ref().ok().map(|r| &r.config));
    if let Err(e) = warden_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let resolved = loaded.context("failed to load configuration")?;
    for file in &resolved.loaded_files {
        tracing::debug!(path = %file, "Loaded config file");
    }
    let config = resolved.config;

    match cli.command {
        Commands::Policy { command } => match command {
            PolicyCommands::Check { file } => policy::check(&config, file)?,
            PolicyCommands::Show { domain } => policy::show(&config, &domain)?,
        },
        Commands::Suite { command } => {
            let cli_host = CliHost::open(config, None)?;
            let result = handle_suite(&cli_host.host, command).await;
            cli_host.close().await?;
            result?;
        },
        Commands::Demo { domain } => {
            let cli_host = CliHost::open(config, Some(Arc::new(TerminalDialog)))?;
            let result = demo::run(Arc::clone(&cli_host.host), &domain).await;
            cli_host.close().await?;
            if result? == HostExit::ShutDown {
                println!("{}", Theme::info("Demo was shut down"));
            }
        },
    }

    Ok(())
}

async fn handle_suite(host: &Host, command: SuiteCommands) -> Result<()> {
    match command {
        SuiteCommands::Install {
            id,
            domain,
            trusted,
        } => suite::install(host, id, &domain, trusted).await,
        SuiteCommands::List => suite::list(host).await,
        SuiteCommands::Uninstall { id } => suite::uninstall(host, &id).await,
        SuiteCommands::Permissions { id } => suite::permissions(host, &id).await,
        SuiteCommands::Set {
            id,
            capability,
            level,
        } => suite::set(host, &id, capability, level).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_suite_set() {
        let cli = Cli::try_parse_from([
            "warden", "--verbose", "suite", "set", "chess", "net.http", "oneshot",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Suite {
                command:
                    SuiteCommands::Set {
                        id,
                        capability,
                        level,
                    },
            } => {
                assert_eq!(id.as_str(), "chess");
                assert_eq!(capability, Capability::NetHttp);
                assert_eq!(level, PermissionLevel::OneShot);
            },
            _ => panic!("expected suite set"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["warden", "suite", "permissions", "Bad Id"]).is_err());
        assert!(
            Cli::try_parse_from(["warden", "suite", "set", "chess", "net.gopher", "allow"])
                .is_err()
        );
        assert!(
            Cli::try_parse_from(["warden", "suite", "set", "chess", "net.http", "sometimes"])
                .is_err()
        );
    }

    #[test]
    fn test_log_format_override() {
        let cli = Cli::try_parse_from(["warden", "--log-format", "json", "-v", "policy", "check"])
            .unwrap();
        let lc = log_config(&cli, Some(&Config::default()));
        assert_eq!(lc.format, LogFormat::Json);
        assert_eq!(lc.level, "debug");
    }
}
