//! Persistent, ordered rule list.
//!
//! The in-memory list is only updated after the key-value store accepted the
//! write, so a failed save leaves the store exactly as it was.

use std::sync::Arc;

use tracing::{error, info, warn};
use veil_core::{KeyValueStore, Result, VeilError};

use crate::record::{RuleError, RuleRecord};

/// Key holding the JSON array of rule strings.
pub const RULES_KEY: &str = "veilBlockedSelectors_v2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The exact rule string is already stored.
    Duplicate,
    Invalid(RuleError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddResult {
    Added { rule: String },
    Rejected(Rejection),
}

pub struct RuleStore {
    kv: Arc<dyn KeyValueStore>,
    host: String,
    rules: Vec<String>,
}

impl std::fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleStore")
            .field("host", &self.host)
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl RuleStore {
    /// A store with no rules loaded yet.
    pub fn empty(kv: Arc<dyn KeyValueStore>, host: impl Into<String>) -> Self {
        Self {
            kv,
            host: host.into(),
            rules: Vec::new(),
        }
    }

    /// Load the stored rule list.
    ///
    /// A stored value that is not a JSON array of strings is reset to `[]`.
    /// A failed read is returned as [`VeilError::Storage`].
    pub async fn load(kv: Arc<dyn KeyValueStore>, host: impl Into<String>) -> Result<Self> {
        let mut store = Self::empty(kv, host);
        store.reload().await?;
        Ok(store)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let raw = self
            .kv
            .get(RULES_KEY)
            .await
            .map_err(|e| VeilError::Storage(format!("failed to read rules: {e:#}")))?;

        self.rules = match raw {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(rules) => rules,
                Err(e) => {
                    warn!(error = %e, "Stored rule list is corrupt; resetting to empty");
                    if let Err(e) = self.kv.set(RULES_KEY, "[]").await {
                        error!(error = %e, "Failed to reset corrupt rule list");
                    }
                    Vec::new()
                }
            },
        };
        info!(count = self.rules.len(), "Loaded rules");
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Rules in insertion order.
    pub fn list(&self) -> &[String] {
        &self.rules
    }

    pub fn contains(&self, rule: &str) -> bool {
        self.rules.iter().any(|r| r == rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Build `<host>##<selector>` (or `##<selector>`) and append it if absent.
    pub async fn add(&mut self, selector: &str, include_scope: bool) -> Result<AddResult> {
        match RuleRecord::for_host(&self.host, selector, include_scope) {
            Ok(record) => self.add_record(&record).await,
            Err(e) => {
                warn!(selector, error = %e, "Refusing to store rule");
                Ok(AddResult::Rejected(Rejection::Invalid(e)))
            }
        }
    }

    /// Append an already validated rule if absent.
    pub async fn add_record(&mut self, record: &RuleRecord) -> Result<AddResult> {
        let rule = record.to_string();
        if self.contains(&rule) {
            info!(rule = %rule, "Rule already stored");
            return Ok(AddResult::Rejected(Rejection::Duplicate));
        }

        let mut next = self.rules.clone();
        next.push(rule.clone());
        self.persist(&next).await?;
        self.rules = next;

        info!(rule = %rule, total = self.rules.len(), "Rule added");
        Ok(AddResult::Added { rule })
    }

    /// Remove the exact rule string. Returns whether it was present.
    pub async fn remove(&mut self, rule: &str) -> Result<bool> {
        let Some(index) = self.rules.iter().position(|r| r == rule) else {
            return Ok(false);
        };
        let mut next = self.rules.clone();
        next.remove(index);
        self.persist(&next).await?;
        self.rules = next;

        info!(rule, total = self.rules.len(), "Rule removed");
        Ok(true)
    }

    /// Replace every rule (restore path). Items are not validated here;
    /// the application engine skips the ones it cannot use.
    pub async fn replace_all(&mut self, rules: Vec<String>) -> Result<()> {
        self.persist(&rules).await?;
        self.rules = rules;
        info!(total = self.rules.len(), "Rules replaced");
        Ok(())
    }

    async fn persist(&self, rules: &[String]) -> Result<()> {
        let json = serde_json::to_string(rules).map_err(|e| VeilError::Other(e.into()))?;
        self.kv
            .set(RULES_KEY, &json)
            .await
            .map_err(|e| VeilError::Storage(format!("failed to save rules: {e:#}")))
    }
}
