pub mod backup;
pub mod engine;
pub mod record;
pub mod store;

pub use backup::{backup_file_name, export_rules, parse_backup, ParsedBackup};
pub use engine::{
    ApplicationEngine, ApplyReport, OriginalPresentation, SkippedRule, SuppressionTable,
    SUPPRESSED_ATTR,
};
pub use record::{RuleError, RuleRecord, Scope, SCOPE_SEPARATOR, WILDCARD_SCOPE};
pub use store::{AddResult, Rejection, RuleStore, RULES_KEY};
