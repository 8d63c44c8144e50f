//! Backup file codec: a pretty-printed JSON array of rule strings.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;
use veil_core::{Result, VeilError};

use crate::record::SCOPE_SEPARATOR;

pub const BACKUP_FILE_PREFIX: &str = "veil_backup_";

/// Serialize the rule list for a backup file.
pub fn export_rules(rules: &[String]) -> Result<String> {
    serde_json::to_string_pretty(rules).map_err(|e| VeilError::Other(e.into()))
}

/// `veil_backup_2024-05-01T13-45-10.json`
pub fn backup_file_name(now: DateTime<Utc>) -> String {
    format!("{BACKUP_FILE_PREFIX}{}.json", now.format("%Y-%m-%dT%H-%M-%S"))
}

/// Contents of a backup file that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBackup {
    pub rules: Vec<String>,
    /// Items without a `##` separator. They are kept; the engine skips them.
    pub malformed: Vec<String>,
}

/// Parse a backup. Anything but a JSON array of strings is
/// [`VeilError::InvalidBackup`].
pub fn parse_backup(raw: &str) -> Result<ParsedBackup> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| VeilError::InvalidBackup(format!("not valid JSON: {e}")))?;
    let Value::Array(items) = value else {
        return Err(VeilError::InvalidBackup(
            "expected a JSON array of rule strings".into(),
        ));
    };

    let mut rules = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::String(rule) => rules.push(rule),
            other => {
                return Err(VeilError::InvalidBackup(format!(
                    "item {index} is not a string: {other}"
                )))
            }
        }
    }

    let malformed: Vec<String> = rules
        .iter()
        .filter(|r| !r.contains(SCOPE_SEPARATOR))
        .cloned()
        .collect();
    if !malformed.is_empty() {
        warn!(count = malformed.len(), "Backup contains rules without '##'");
    }
    Ok(ParsedBackup { rules, malformed })
}
