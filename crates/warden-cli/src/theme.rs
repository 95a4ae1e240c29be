//! CLI theme and styling.

use colored::Colorize;
use warden_capabilities::PermissionLevel;

/// CLI theme configuration.
pub(crate) struct Theme;

impl Theme {
    /// Format a header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an info message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format a dimmed message.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "━".repeat(50).dimmed().to_string()
    }

    /// Color a permission level by how much it grants.
    pub(crate) fn level(level: PermissionLevel) -> String {
        let label = format!("{:<16}", level.label());
        match level {
            PermissionLevel::Allow | PermissionLevel::BlanketGranted => label.green().to_string(),
            PermissionLevel::Blanket | PermissionLevel::Session | PermissionLevel::OneShot => {
                label.yellow().to_string()
            },
            PermissionLevel::Never => label.dimmed().to_string(),
            PermissionLevel::Deny | PermissionLevel::DenySession | PermissionLevel::UserDenied => {
                label.red().to_string()
            },
        }
    }
}
