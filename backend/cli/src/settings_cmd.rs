//! CLI Settings Subcommands

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde_json::Value;
use veil_config::{apply_merge_patch, load_settings, save_settings, validate, Settings};
use veil_core::KeyValueStore;

use crate::terminal_output::{note_error, note_success};

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print the effective settings as JSON
    Show,
    /// Lift every hide rule until re-enabled
    Disable,
    /// Re-enable hide rules
    Enable,
    /// Update settings with a JSON Merge Patch, e.g. '{"panelOpacity": 0.8}'
    Patch { patch: String },
}

pub async fn run(cmd: SettingsCommands, kv: Arc<dyn KeyValueStore>) -> Result<()> {
    let settings = load_settings(kv.as_ref()).await?;
    match cmd {
        SettingsCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsCommands::Disable => {
            set_disabled(kv.as_ref(), settings, true).await?;
            note_success("Blocking is temporarily disabled.");
        }
        SettingsCommands::Enable => {
            set_disabled(kv.as_ref(), settings, false).await?;
            note_success("Blocking is enabled again.");
        }
        SettingsCommands::Patch { patch } => {
            let patch: Value = serde_json::from_str(&patch).context("Patch is not valid JSON")?;
            let next = apply_merge_patch(&settings, &patch)?;
            let report = validate(&next);
            if !report.is_valid() {
                for problem in &report.errors {
                    note_error(&problem.to_string());
                }
                bail!("settings not saved");
            }
            save_settings(kv.as_ref(), &next).await?;
            println!("{}", serde_json::to_string_pretty(&next)?);
        }
    }
    Ok(())
}

async fn set_disabled(kv: &dyn KeyValueStore, settings: Settings, disabled: bool) -> Result<()> {
    let next = Settings {
        temp_blocking_disabled: disabled,
        ..settings
    };
    save_settings(kv, &next).await
}
