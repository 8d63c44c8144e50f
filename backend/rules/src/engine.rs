//! Rule application engine.
//!
//! Hides every element matched by an in-scope rule and remembers how to undo
//! it. The engine exclusively owns the [`SuppressionTable`]: one entry per
//! element it hid, holding the inline `display` the element had before.
//! Hidden elements are also tagged with [`SUPPRESSED_ATTR`] so the state is
//! visible in the page.
//!
//! # Invariants
//!
//! 1. Every element tagged by the engine has a table entry after `apply`.
//! 2. `lift_all` leaves no tagged element and an empty table.
//! 3. Elements already invisible through the page's own styling are never
//!    touched.
//! 4. A rule that fails to parse or query is skipped; the others still apply.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};
use veil_core::{Document, NodeId, Result, DISPLAY_NONE};

use crate::record::RuleRecord;

/// Attribute marking elements hidden by the engine.
pub const SUPPRESSED_ATTR: &str = "data-veil-hidden";

/// Presentation of an element before the engine hid it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginalPresentation {
    /// No inline `display`; restoring clears the override.
    NoOverride,
    /// Inline `display` value to put back.
    Override(String),
}

#[derive(Debug, Default)]
pub struct SuppressionTable {
    entries: HashMap<NodeId, OriginalPresentation>,
}

impl SuppressionTable {
    pub fn get(&self, node: NodeId) -> Option<&OriginalPresentation> {
        self.entries.get(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRule {
    pub rule: String,
    pub reason: String,
}

/// Result of one `apply` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Rules whose query returned at least one element.
    pub matched_rules: usize,
    /// Elements hidden during this pass.
    pub newly_hidden: usize,
    pub skipped: Vec<SkippedRule>,
}

#[derive(Debug, Default)]
pub struct ApplicationEngine {
    table: SuppressionTable,
}

impl ApplicationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &SuppressionTable {
        &self.table
    }

    pub fn is_suppressed(&self, node: NodeId) -> bool {
        self.table.contains(node)
    }

    /// Apply every rule in scope for the document's host.
    ///
    /// With `disabled` set the rule set is treated as empty: everything is
    /// lifted and nothing matches.
    pub fn apply(&mut self, doc: &mut Document, rules: &[String], disabled: bool) -> ApplyReport {
        if disabled {
            debug!("Blocking temporarily disabled; lifting instead of applying");
            self.lift_all(doc);
            return ApplyReport::default();
        }

        let host = doc.host().to_string();
        let mut report = ApplyReport::default();

        for rule in rules {
            let record = match RuleRecord::parse(rule) {
                Ok(record) => record,
                Err(e) => {
                    warn!(rule = %rule, error = %e, "Skipping malformed rule");
                    report.skipped.push(SkippedRule {
                        rule: rule.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !record.applies_to(&host) {
                continue;
            }

            match self.apply_selector(doc, record.selector()) {
                Ok((matched, hidden)) => {
                    if matched > 0 {
                        report.matched_rules += 1;
                    }
                    report.newly_hidden += hidden;
                }
                Err(e) => {
                    warn!(rule = %rule, error = %e, "Skipping rule the query engine rejected");
                    report.skipped.push(SkippedRule {
                        rule: rule.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            matched = report.matched_rules,
            hidden = report.newly_hidden,
            skipped = report.skipped.len(),
            "Applied rules"
        );
        report
    }

    /// Hide everything `selector` matches right now.
    ///
    /// Returns `(matched, newly_hidden)`. Used directly for the eager apply
    /// of a freshly saved rule.
    pub fn apply_selector(&mut self, doc: &mut Document, selector: &str) -> Result<(usize, usize)> {
        let matches = doc.query_selector_all(selector)?;
        let mut hidden = 0;
        for node in &matches {
            if self.suppress(doc, *node)? {
                hidden += 1;
            }
        }
        Ok((matches.len(), hidden))
    }

    fn suppress(&mut self, doc: &mut Document, node: NodeId) -> Result<bool> {
        let tagged = doc.attr(node, SUPPRESSED_ATTR) == Some("true");
        let forced_none = doc
            .inline_display(node)
            .is_some_and(|d| d.value.eq_ignore_ascii_case(DISPLAY_NONE));

        if tagged && forced_none {
            // Tag survived but the table did not: the pre-hide value is lost.
            self.table
                .entries
                .entry(node)
                .or_insert(OriginalPresentation::NoOverride);
            return Ok(false);
        }
        if doc.is_display_none(node) {
            return Ok(false);
        }

        let original = match doc.inline_display(node) {
            Some(inline) => OriginalPresentation::Override(inline.value.clone()),
            None => OriginalPresentation::NoOverride,
        };
        self.table.entries.entry(node).or_insert(original);
        doc.set_inline_display(node, DISPLAY_NONE, true)?;
        doc.set_attr(node, SUPPRESSED_ATTR, "true")?;
        Ok(true)
    }

    /// Undo every suppression. The rule list is not touched.
    ///
    /// Returns the number of elements restored.
    pub fn lift_all(&mut self, doc: &mut Document) -> usize {
        let mut targets: Vec<NodeId> = doc
            .elements()
            .into_iter()
            .filter(|n| doc.attr(*n, SUPPRESSED_ATTR) == Some("true"))
            .collect();
        for node in self.table.nodes() {
            if !targets.contains(&node) {
                targets.push(node);
            }
        }

        let mut restored = 0;
        for node in targets {
            let original = self.table.entries.remove(&node);
            let result = match original {
                Some(OriginalPresentation::Override(value)) => {
                    doc.set_inline_display(node, &value, false)
                }
                Some(OriginalPresentation::NoOverride) | None => doc.clear_inline_display(node),
            }
            .and_then(|()| doc.remove_attr(node, SUPPRESSED_ATTR));

            match result {
                Ok(_) => restored += 1,
                Err(e) => warn!(%node, error = %e, "Failed to restore element"),
            }
        }
        self.table.entries.clear();

        info!(restored, "Lifted all suppression");
        restored
    }

    /// `lift_all` followed by `apply`; used after re-enabling, deleting a
    /// rule, or importing a backup so no element stays hidden by a rule that
    /// is gone.
    pub fn restore_all(&mut self, doc: &mut Document, rules: &[String], disabled: bool) -> ApplyReport {
        self.lift_all(doc);
        self.apply(doc, rules, disabled)
    }

    /// Elements matched by `rule` that the engine currently hides.
    pub fn suppressed_by(&self, doc: &Document, rule: &str) -> Vec<NodeId> {
        let Ok(record) = RuleRecord::parse(rule) else {
            return Vec::new();
        };
        if !record.applies_to(doc.host()) {
            return Vec::new();
        }
        doc.query_selector_all(record.selector())
            .map(|nodes| nodes.into_iter().filter(|n| self.is_suppressed(*n)).collect())
            .unwrap_or_default()
    }
}
