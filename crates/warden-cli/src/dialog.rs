//! Terminal permission dialog.
//!
//! Presents questions with `dialoguer`. The prompt blocks its thread, so it
//! runs on the blocking pool and the dispatch loop stays responsive.

use async_trait::async_trait;
use colored::Colorize;
use dialoguer::{Select, theme::ColorfulTheme};
use warden_approval::{DialogOutcome, PermissionDialog, PermissionQuestion};

/// Asks on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TerminalDialog;

#[async_trait]
impl PermissionDialog for TerminalDialog {
    async fn ask(&self, question: PermissionQuestion) -> DialogOutcome {
        let prompt = tokio::task::spawn_blocking(move || {
            println!();
            println!("{}", question.title.bold().yellow());
            println!("{}", question.body);

            let labels: Vec<&str> = question.options.iter().map(|o| o.label()).collect();
            // Esc and q map to `None`, which is a cancel.
            Select::with_theme(&ColorfulTheme::default())
                .items(&labels)
                .default(0)
                .interact_opt()
                .map(|picked| picked.and_then(|idx| question.options.get(idx).copied()))
        })
        .await;

        match prompt {
            Ok(Ok(Some(choice))) => DialogOutcome::Answered(choice),
            Ok(Ok(None)) => DialogOutcome::Cancelled,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Terminal prompt failed");
                DialogOutcome::Interrupted
            },
            Err(e) => {
                tracing::warn!(error = %e, "Prompt task did not finish");
                DialogOutcome::Interrupted
            },
        }
    }
}
