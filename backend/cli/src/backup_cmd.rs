//! CLI Backup / Restore Commands

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::info;
use veil_core::{KeyValueStore, VeilError};
use veil_logging::{RuleEvent, RuleEventLogger};
use veil_rules::{backup_file_name, export_rules, parse_backup, RuleStore};

use crate::terminal_output::{note_error, note_info, note_success, note_warn};

/// Write `veil_backup_<timestamp>.json` into `out_dir`.
pub async fn backup(kv: Arc<dyn KeyValueStore>, host: &str, out_dir: &Path) -> Result<()> {
    let store = RuleStore::load(kv, host)
        .await
        .context("Failed to load rules")?;
    if store.is_empty() {
        note_info("There are no rules to back up.");
        return Ok(());
    }

    let contents = export_rules(store.list())?;
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let path = out_dir.join(backup_file_name(Utc::now()));
    tokio::fs::write(&path, contents)
        .await
        .with_context(|| format!("Failed to write backup: {}", path.display()))?;

    info!(path = %path.display(), rules = store.len(), "Backup written");
    note_success(&format!(
        "Backed up {} rule(s) to {}.",
        store.len(),
        path.display()
    ));
    Ok(())
}

/// Replace every stored rule with the contents of `file`.
pub async fn restore(kv: Arc<dyn KeyValueStore>, host: &str, file: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read backup: {}", file.display()))?;

    let parsed = match parse_backup(&raw) {
        Ok(parsed) => parsed,
        Err(VeilError::InvalidBackup(reason)) => {
            note_error("Invalid backup file: expected a JSON array of rules.");
            bail!("invalid backup {}: {reason}", file.display());
        }
        Err(e) => return Err(e.into()),
    };
    if !parsed.malformed.is_empty() {
        note_warn(&format!(
            "{} restored rule(s) lack '##' and will be ignored.",
            parsed.malformed.len()
        ));
    }

    let mut store = RuleStore::empty(kv, host);
    let rules = parsed.rules.len();
    store
        .replace_all(parsed.rules)
        .await
        .context("Failed to store restored rules")?;
    RuleEventLogger::log_event(host, RuleEvent::Restored { rules });
    note_success(&format!("Restored {rules} rule(s)."));
    Ok(())
}
