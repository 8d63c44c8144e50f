//! Rule Event Logger
//!
//! Rule lifecycle events written as structured entries under the
//! `rule_events` target, so they can be filtered out of the general log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

pub const RULE_EVENTS_TARGET: &str = "rule_events";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleEvent {
    Added {
        rule: String,
    },
    Removed {
        rule: String,
    },
    Applied {
        matched_rules: usize,
        newly_hidden: usize,
    },
    Lifted {
        restored: usize,
    },
    Restored {
        rules: usize,
    },
    Skipped {
        rule: String,
        reason: String,
    },
}

#[derive(Debug, Serialize)]
pub struct RuleEventEntry {
    pub host: String,
    pub timestamp: DateTime<Utc>,
    pub event: RuleEvent,
}

pub struct RuleEventLogger;

impl RuleEventLogger {
    pub fn entry(host: &str, event: RuleEvent) -> RuleEventEntry {
        RuleEventEntry {
            host: host.into(),
            timestamp: Utc::now(),
            event,
        }
    }

    /// Serialize the event and hand it to `tracing`.
    pub fn log_event(host: &str, event: RuleEvent) {
        let entry = Self::entry(host, event);
        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: RULE_EVENTS_TARGET, event = %json, "Rule event"),
            Err(_) => info!(target: RULE_EVENTS_TARGET, event = ?entry, "Rule event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_serialize_with_type_tag() {
        let entry = RuleEventLogger::entry(
            "example.com",
            RuleEvent::Added {
                rule: "example.com##.ad-banner".into(),
            },
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["host"], "example.com");
        assert_eq!(json["event"]["type"], "added");
        assert_eq!(json["event"]["rule"], "example.com##.ad-banner");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn log_event_without_subscriber_is_a_no_op() {
        RuleEventLogger::log_event(
            "example.com",
            RuleEvent::Applied {
                matched_rules: 1,
                newly_hidden: 3,
            },
        );
    }
}
