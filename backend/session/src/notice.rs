//! User-facing notices.
//!
//! Every failure path in a session degrades to "no-op plus a notice". The
//! host UI drains them with [`crate::Session::take_notices`] and shows them
//! however it likes (toasts, CLI output).

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    NoSelection,
    CannotGenerateSelector,
    SelectorNotUnique { selector: String, matches: usize },
    RuleSaved { rule: String },
    RuleSavedApplyFailed { rule: String },
    DuplicateRule,
    InvalidRule { reason: String },
    RuleSaveFailed,
    RuleDeleted { rule: String },
    RuleDeleteFailed,
    RulesApplied { count: usize },
    BlockingDisabled,
    BlockingEnabled,
    NothingToBackUp,
    BackupReady { file_name: String, rules: usize },
    InvalidBackupFile,
    RestoreFailed,
    RestoreSucceeded { rules: usize },
    RestoreHasMalformedRules { count: usize },
    RulesLoadFailed,
    SettingsLoadFailed,
    SettingsSaveFailed,
    SettingOutOfRange { field: String },
    AlreadyHidden,
    DifferentElement,
}

impl Notice {
    pub fn level(&self) -> NoticeLevel {
        match self {
            Self::RuleSaved { .. }
            | Self::RuleDeleted { .. }
            | Self::RulesApplied { .. }
            | Self::BackupReady { .. }
            | Self::RestoreSucceeded { .. }
            | Self::BlockingEnabled => NoticeLevel::Success,
            Self::DuplicateRule | Self::NothingToBackUp | Self::NoSelection => NoticeLevel::Info,
            Self::SelectorNotUnique { .. }
            | Self::RuleSavedApplyFailed { .. }
            | Self::BlockingDisabled
            | Self::RestoreHasMalformedRules { .. }
            | Self::AlreadyHidden
            | Self::DifferentElement => NoticeLevel::Warning,
            Self::CannotGenerateSelector
            | Self::InvalidRule { .. }
            | Self::RuleSaveFailed
            | Self::RuleDeleteFailed
            | Self::InvalidBackupFile
            | Self::RestoreFailed
            | Self::RulesLoadFailed
            | Self::SettingsLoadFailed
            | Self::SettingsSaveFailed
            | Self::SettingOutOfRange { .. } => NoticeLevel::Error,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSelection => write!(f, "Select an element first."),
            Self::CannotGenerateSelector => {
                write!(f, "Could not build a selector for this element.")
            }
            Self::SelectorNotUnique { selector, matches } => write!(
                f,
                "Selector '{selector}' matches {matches} elements; all of them will be hidden."
            ),
            Self::RuleSaved { rule } => write!(f, "Rule saved: {rule}"),
            Self::RuleSavedApplyFailed { rule } => {
                write!(f, "Rule saved, but it could not be applied right away: {rule}")
            }
            Self::DuplicateRule => write!(f, "This rule is already saved."),
            Self::InvalidRule { reason } => write!(f, "Rule not saved: {reason}."),
            Self::RuleSaveFailed => write!(f, "Failed to save the rule."),
            Self::RuleDeleted { rule } => write!(f, "Rule deleted: {rule}"),
            Self::RuleDeleteFailed => write!(f, "Failed to delete the rule."),
            Self::RulesApplied { count } => write!(f, "{count} rule(s) applied."),
            Self::BlockingDisabled => write!(f, "Blocking is temporarily disabled."),
            Self::BlockingEnabled => write!(f, "Blocking is enabled again."),
            Self::NothingToBackUp => write!(f, "There are no rules to back up."),
            Self::BackupReady { file_name, rules } => {
                write!(f, "Backed up {rules} rule(s) to {file_name}.")
            }
            Self::InvalidBackupFile => {
                write!(f, "Invalid backup file: expected a JSON array of rules.")
            }
            Self::RestoreFailed => write!(f, "Restoring the backup failed."),
            Self::RestoreSucceeded { rules } => write!(f, "Restored {rules} rule(s)."),
            Self::RestoreHasMalformedRules { count } => {
                write!(f, "{count} restored rule(s) lack '##' and will be ignored.")
            }
            Self::RulesLoadFailed => write!(f, "Failed to load saved rules."),
            Self::SettingsLoadFailed => write!(f, "Failed to load settings; using defaults."),
            Self::SettingsSaveFailed => write!(f, "Failed to save settings."),
            Self::SettingOutOfRange { field } => write!(f, "Value for '{field}' is out of range."),
            Self::AlreadyHidden => write!(f, "The element is already hidden."),
            Self::DifferentElement => {
                write!(f, "The previewed element is no longer the selected one.")
            }
        }
    }
}
