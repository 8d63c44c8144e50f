//! Structured logging for Veil.
//!
//! Handles console and rolling NDJSON file output, plus rule lifecycle
//! events (added, removed, applied, lifted) under a dedicated target.

pub mod event_logger;
pub mod logger;

pub use event_logger::{RuleEvent, RuleEventEntry, RuleEventLogger, RULE_EVENTS_TARGET};
pub use logger::{init_logger, LOG_FILE_PREFIX};
