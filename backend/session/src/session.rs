//! One page instance of Veil.
//!
//! A [`Session`] owns the live document together with everything scoped to
//! it: the loaded settings, the rule store, the application engine and its
//! suppression table, the tap gesture machine, and the current selection.
//! It is what the host UI talks to.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use veil_config::{
    load_settings, save_settings, validate, DebouncedWriter, Settings, DEFAULT_QUIET_PERIOD,
};
use veil_core::{
    Document, InlineDisplay, KeyValueStore, NodeId, Rect, Result, VeilError, DISPLAY_NONE,
};
use veil_logging::{RuleEvent, RuleEventLogger};
use veil_picker::{
    ancestor_at_level, max_level, synthesize, DragOutcome, GestureConfig, GestureOutcome,
    PanelDrag, PointerEvent, SynthesisMode, TapSelector, Viewport, DEFAULT_MAX_DEPTH,
    HIGHLIGHT_CLASS,
};
use veil_rules::{
    backup_file_name, export_rules, parse_backup, AddResult, ApplicationEngine, ApplyReport,
    Rejection, RuleRecord, RuleStore,
};

use crate::notice::Notice;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub max_depth: usize,
    pub gesture: GestureConfig,
    /// Quiet period for slider-driven settings; `None` writes immediately.
    pub settings_quiet_period: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            gesture: GestureConfig::default(),
            settings_quiet_period: Some(DEFAULT_QUIET_PERIOD),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    /// Node the user tapped.
    base: NodeId,
    level: usize,
    /// `base` widened by `level` ancestors.
    node: NodeId,
}

#[derive(Debug, Clone)]
struct PreviewHide {
    node: NodeId,
    original: Option<InlineDisplay>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewToggle {
    Hidden,
    Shown,
    Refused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Added { rule: String, hidden: usize },
    Duplicate,
    Invalid,
    NoSelector,
}

/// A backup ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backup {
    pub file_name: String,
    pub contents: String,
    pub rules: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub rules: usize,
    pub malformed: usize,
    pub report: ApplyReport,
}

pub struct Session {
    doc: Document,
    kv: Arc<dyn KeyValueStore>,
    settings: Settings,
    store: RuleStore,
    engine: ApplicationEngine,
    tap: TapSelector,
    drag: PanelDrag,
    writer: Option<DebouncedWriter>,
    max_depth: usize,
    selecting: bool,
    selection: Option<Selection>,
    preview: Option<PreviewHide>,
    notices: Vec<Notice>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.doc.host())
            .field("rules", &self.store.len())
            .field("suppressed", &self.engine.table().len())
            .field("selecting", &self.selecting)
            .finish()
    }
}

impl Session {
    /// Load settings and rules for the document's host and apply the rules.
    ///
    /// Storage failures do not prevent opening: the session continues on
    /// defaults and queues a notice.
    pub async fn open(doc: Document, kv: Arc<dyn KeyValueStore>, options: SessionOptions) -> Self {
        let mut notices = Vec::new();

        let settings = match load_settings(kv.as_ref()).await {
            Ok(settings) => settings,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to load settings");
                notices.push(Notice::SettingsLoadFailed);
                Settings::default()
            }
        };

        let host = doc.host().to_string();
        let store = match RuleStore::load(kv.clone(), host.clone()).await {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, "Failed to load rules");
                notices.push(Notice::RulesLoadFailed);
                RuleStore::empty(kv.clone(), host)
            }
        };

        let writer = options
            .settings_quiet_period
            .map(|quiet| DebouncedWriter::spawn(kv.clone(), quiet));

        let mut session = Self {
            doc,
            kv,
            settings,
            store,
            engine: ApplicationEngine::new(),
            tap: TapSelector::new(options.gesture),
            drag: PanelDrag::new(),
            writer,
            max_depth: options.max_depth,
            selecting: false,
            selection: None,
            preview: None,
            notices,
        };
        session.apply(false);
        session
    }

    /// Flush pending settings and stop background work.
    pub async fn close(mut self) {
        self.reset_preview();
        if let Some(writer) = self.writer.take() {
            writer.shutdown().await;
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Mutable access for the host, e.g. to mirror page mutations.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &ApplicationEngine {
        &self.engine
    }

    /// Drain queued notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, notice: Notice) {
        debug!(%notice, "Notice");
        self.notices.push(notice);
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Selector for on-screen display; no uniqueness guarantee.
    pub fn preview_selector(&self, node: NodeId) -> Option<String> {
        synthesize(&self.doc, node, self.max_depth, SynthesisMode::Preview)
    }

    pub fn is_selecting(&self) -> bool {
        self.selecting
    }

    /// Enter or leave selection mode. Leaving clears the selection, restores
    /// any preview-hidden element, and resets the gesture machine.
    pub fn set_selecting(&mut self, on: bool) {
        if self.selecting == on {
            return;
        }
        self.selecting = on;
        if !on {
            self.clear_selection();
            self.tap.reset();
        }
        info!(selecting = on, "Selection mode changed");
    }

    /// Feed a pointer event. Only acts while selection mode is on.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> GestureOutcome {
        if !self.selecting {
            return GestureOutcome::Ignored;
        }
        let outcome = self.tap.process(&self.doc, event);
        match outcome {
            GestureOutcome::Committed { node, .. } => self.select(node),
            GestureOutcome::Missed { .. } => self.clear_selection(),
            _ => {}
        }
        outcome
    }

    /// Feed a pointer event aimed at one of the overlay panels. A drag moves
    /// the panel's box in the document, clamped to `viewport`.
    pub fn handle_panel_pointer(
        &mut self,
        panel: NodeId,
        event: &PointerEvent,
        viewport: Viewport,
    ) -> DragOutcome {
        let Some(rect) = self.doc.element(panel).and_then(|e| e.rect()) else {
            return DragOutcome::Ignored;
        };
        let outcome = self.drag.process(&self.doc, event, rect, viewport);
        if let DragOutcome::Moved { x, y } | DragOutcome::Ended { x, y } = outcome {
            let moved = Rect { x, y, ..rect };
            if let Err(e) = self.doc.set_rect(panel, moved) {
                warn!(error = %e, "Failed to move panel");
            }
        }
        outcome
    }

    /// Make `node` the current selection at ancestor level 0.
    pub fn select(&mut self, node: NodeId) {
        self.reset_preview();
        self.set_highlight(None);
        self.selection = Some(Selection {
            base: node,
            level: 0,
            node,
        });
        self.set_highlight(Some(node));
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selection.map(|s| s.node)
    }

    pub fn ancestor_level(&self) -> usize {
        self.selection.map(|s| s.level).unwrap_or_default()
    }

    /// Largest useful ancestor level for the current selection.
    pub fn max_ancestor_level(&self) -> usize {
        self.selection
            .map(|s| max_level(&self.doc, s.base))
            .unwrap_or_default()
    }

    /// Re-walk from the tapped node by `level` ancestors.
    pub fn set_ancestor_level(&mut self, level: usize) -> Option<NodeId> {
        let mut selection = self.selection?;
        self.reset_preview();
        self.set_highlight(None);
        selection.level = level;
        selection.node = ancestor_at_level(&self.doc, selection.base, level);
        self.selection = Some(selection);
        self.set_highlight(Some(selection.node));
        Some(selection.node)
    }

    fn clear_selection(&mut self) {
        self.reset_preview();
        self.set_highlight(None);
        self.selection = None;
    }

    fn set_highlight(&mut self, node: Option<NodeId>) {
        let result = match (node, self.selection) {
            (Some(node), _) => self.doc.add_class(node, HIGHLIGHT_CLASS),
            (None, Some(current)) => self.doc.remove_class(current.node, HIGHLIGHT_CLASS),
            (None, None) => Ok(()),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to update highlight");
        }
    }

    // -----------------------------------------------------------------------
    // Preview hide
    // -----------------------------------------------------------------------

    /// Temporarily hide the selected element, or show it again.
    pub fn toggle_preview(&mut self) -> PreviewToggle {
        let Some(selected) = self.selected() else {
            self.notify(Notice::NoSelection);
            return PreviewToggle::Refused;
        };

        if let Some(previewed) = self.preview.as_ref().map(|p| p.node) {
            if previewed != selected {
                self.notify(Notice::DifferentElement);
                return PreviewToggle::Refused;
            }
            self.reset_preview();
            return PreviewToggle::Shown;
        }

        if self.doc.is_display_none(selected) {
            self.notify(Notice::AlreadyHidden);
            return PreviewToggle::Refused;
        }
        let original = self.doc.inline_display(selected).cloned();
        if let Err(e) = self.doc.set_inline_display(selected, DISPLAY_NONE, true) {
            warn!(error = %e, "Failed to hide preview");
            return PreviewToggle::Refused;
        }
        self.preview = Some(PreviewHide {
            node: selected,
            original,
        });
        PreviewToggle::Hidden
    }

    pub fn is_previewing(&self) -> bool {
        self.preview.is_some()
    }

    fn reset_preview(&mut self) {
        let Some(preview) = self.preview.take() else {
            return;
        };
        let result = match preview.original {
            Some(original) => {
                self.doc
                    .set_inline_display(preview.node, &original.value, original.important)
            }
            None => self.doc.clear_inline_display(preview.node),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to restore previewed element");
        }
    }

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    /// Full rule text for the current selection, without saving it.
    pub fn rule_text_for_selection(&mut self) -> Option<String> {
        let Some(node) = self.selected() else {
            self.notify(Notice::NoSelection);
            return None;
        };
        let Some(selector) = synthesize(&self.doc, node, self.max_depth, SynthesisMode::RequireUnique)
        else {
            self.notify(Notice::CannotGenerateSelector);
            return None;
        };
        match RuleRecord::for_host(self.doc.host(), &selector, self.settings.include_site_name) {
            Ok(record) => Some(record.to_string()),
            Err(e) => {
                self.notify(Notice::InvalidRule {
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Save the current selection as a rule.
    pub async fn commit_selection(&mut self) -> Result<CommitOutcome> {
        match self.selected() {
            Some(node) => self.commit_rule(node).await,
            None => {
                self.notify(Notice::NoSelection);
                Ok(CommitOutcome::NoSelector)
            }
        }
    }

    /// Build a unique selector for `node`, store it, and hide its matches
    /// right away. Leaves selection mode on success.
    pub async fn commit_rule(&mut self, node: NodeId) -> Result<CommitOutcome> {
        self.reset_preview();

        let Some(selector) = synthesize(&self.doc, node, self.max_depth, SynthesisMode::RequireUnique)
        else {
            self.notify(Notice::CannotGenerateSelector);
            return Ok(CommitOutcome::NoSelector);
        };
        let matches = self.doc.count_matches(&selector).unwrap_or_default();
        if matches != 1 {
            warn!(selector = %selector, matches, "Saving a non-unique selector");
            self.notify(Notice::SelectorNotUnique {
                selector: selector.clone(),
                matches,
            });
        }

        let include_scope = self.settings.include_site_name;
        let rule = match self.store.add(&selector, include_scope).await {
            Ok(AddResult::Added { rule }) => rule,
            Ok(AddResult::Rejected(Rejection::Duplicate)) => {
                self.notify(Notice::DuplicateRule);
                return Ok(CommitOutcome::Duplicate);
            }
            Ok(AddResult::Rejected(Rejection::Invalid(e))) => {
                self.notify(Notice::InvalidRule {
                    reason: e.to_string(),
                });
                return Ok(CommitOutcome::Invalid);
            }
            Err(e) => {
                error!(error = %e, "Failed to save rule");
                self.notify(Notice::RuleSaveFailed);
                return Err(e);
            }
        };
        RuleEventLogger::log_event(self.doc.host(), RuleEvent::Added { rule: rule.clone() });

        let mut hidden = 0;
        if !self.settings.temp_blocking_disabled {
            match self.engine.apply_selector(&mut self.doc, &selector) {
                Ok((_, newly)) => hidden = newly,
                Err(e) => {
                    warn!(rule = %rule, error = %e, "Saved rule could not be applied");
                    self.notify(Notice::RuleSavedApplyFailed { rule: rule.clone() });
                }
            }
        }
        self.notify(Notice::RuleSaved { rule: rule.clone() });
        self.clear_selection();
        self.set_selecting(false);
        Ok(CommitOutcome::Added { rule, hidden })
    }

    /// Delete a rule and re-derive suppression from the remaining ones.
    pub async fn delete_rule(&mut self, rule: &str) -> Result<bool> {
        match self.store.remove(rule).await {
            Ok(false) => Ok(false),
            Ok(true) => {
                RuleEventLogger::log_event(self.doc.host(), RuleEvent::Removed { rule: rule.into() });
                self.reapply();
                self.notify(Notice::RuleDeleted { rule: rule.into() });
                Ok(true)
            }
            Err(e) => {
                error!(rule, error = %e, "Failed to delete rule");
                self.notify(Notice::RuleDeleteFailed);
                Err(e)
            }
        }
    }

    pub fn list_rules(&self) -> &[String] {
        self.store.list()
    }

    /// Apply every stored rule. With `show_summary` a notice reports how
    /// many rules matched.
    pub fn apply(&mut self, show_summary: bool) -> ApplyReport {
        let disabled = self.settings.temp_blocking_disabled;
        let report = self.engine.apply(&mut self.doc, self.store.list(), disabled);
        self.log_report(&report);
        if show_summary && !disabled && report.matched_rules > 0 {
            self.notify(Notice::RulesApplied {
                count: report.matched_rules,
            });
        }
        report
    }

    /// Undo all suppression without touching the rules.
    pub fn lift_all(&mut self) -> usize {
        let restored = self.engine.lift_all(&mut self.doc);
        RuleEventLogger::log_event(self.doc.host(), RuleEvent::Lifted { restored });
        restored
    }

    fn reapply(&mut self) -> ApplyReport {
        let disabled = self.settings.temp_blocking_disabled;
        let report = self
            .engine
            .restore_all(&mut self.doc, self.store.list(), disabled);
        self.log_report(&report);
        report
    }

    fn log_report(&self, report: &ApplyReport) {
        let host = self.doc.host();
        for skipped in &report.skipped {
            RuleEventLogger::log_event(
                host,
                RuleEvent::Skipped {
                    rule: skipped.rule.clone(),
                    reason: skipped.reason.clone(),
                },
            );
        }
        RuleEventLogger::log_event(
            host,
            RuleEvent::Applied {
                matched_rules: report.matched_rules,
                newly_hidden: report.newly_hidden,
            },
        );
    }

    /// Turn the global "lift everything" switch on or off.
    ///
    /// The new value takes effect even if it cannot be persisted.
    pub async fn set_temporary_disable(&mut self, disabled: bool) {
        self.settings.temp_blocking_disabled = disabled;
        self.persist_settings_now().await;
        if disabled {
            self.lift_all();
            self.notify(Notice::BlockingDisabled);
        } else {
            self.reapply();
            self.notify(Notice::BlockingEnabled);
        }
    }

    // -----------------------------------------------------------------------
    // Backup / restore
    // -----------------------------------------------------------------------

    /// Serialize the rules for a timestamped backup file. `None` when there
    /// is nothing to back up.
    pub fn export_rules(&mut self) -> Result<Option<Backup>> {
        if self.store.is_empty() {
            self.notify(Notice::NothingToBackUp);
            return Ok(None);
        }
        let contents = export_rules(self.store.list())?;
        let backup = Backup {
            file_name: backup_file_name(Utc::now()),
            contents,
            rules: self.store.len(),
        };
        self.notify(Notice::BackupReady {
            file_name: backup.file_name.clone(),
            rules: backup.rules,
        });
        Ok(Some(backup))
    }

    /// Replace every rule with the contents of a backup and re-apply.
    ///
    /// A payload that is not a JSON array of strings is rejected before the
    /// store is touched.
    pub async fn import_rules(&mut self, json: &str) -> Result<ImportOutcome> {
        let parsed = match parse_backup(json) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Rejected backup");
                self.notify(if matches!(e, VeilError::InvalidBackup(_)) {
                    Notice::InvalidBackupFile
                } else {
                    Notice::RestoreFailed
                });
                return Err(e);
            }
        };
        if !parsed.malformed.is_empty() {
            self.notify(Notice::RestoreHasMalformedRules {
                count: parsed.malformed.len(),
            });
        }

        let rules = parsed.rules.len();
        if let Err(e) = self.store.replace_all(parsed.rules).await {
            error!(error = %e, "Failed to store restored rules");
            self.notify(Notice::RestoreFailed);
            return Err(e);
        }
        RuleEventLogger::log_event(self.doc.host(), RuleEvent::Restored { rules });

        let report = self.reapply();
        self.notify(Notice::RestoreSucceeded { rules });
        Ok(ImportOutcome {
            rules,
            malformed: parsed.malformed.len(),
            report,
        })
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    pub async fn set_include_site_name(&mut self, include: bool) {
        self.settings.include_site_name = include;
        self.persist_settings_now().await;
    }

    pub async fn set_show_logo(&mut self, show: bool) {
        self.settings.show_logo = show;
        self.persist_settings_now().await;
    }

    pub async fn set_panel_opacity(&mut self, value: f64) -> Result<()> {
        self.update_slider(|s| s.panel_opacity = value).await
    }

    pub async fn set_toggle_size_scale(&mut self, value: f64) -> Result<()> {
        self.update_slider(|s| s.toggle_size_scale = value).await
    }

    pub async fn set_toggle_opacity(&mut self, value: f64) -> Result<()> {
        self.update_slider(|s| s.toggle_opacity = value).await
    }

    /// Apply a slider change live and queue it for a debounced write.
    async fn update_slider(&mut self, change: impl FnOnce(&mut Settings)) -> Result<()> {
        let mut next = self.settings.clone();
        change(&mut next);
        let report = validate(&next);
        if let Some(problem) = report.errors.first() {
            let field = problem.path.clone();
            let message = problem.to_string();
            self.notify(Notice::SettingOutOfRange { field });
            return Err(VeilError::Config(message));
        }
        self.settings = next;
        match &self.writer {
            Some(writer) => writer.update(self.settings.clone()),
            None => self.persist_settings_now().await,
        }
        Ok(())
    }

    /// Write pending slider changes now.
    pub async fn flush_settings(&mut self) {
        let Some(writer) = &self.writer else { return };
        if let Err(e) = writer.flush().await {
            error!(error = %format!("{e:#}"), "Failed to save settings");
            self.notify(Notice::SettingsSaveFailed);
        }
    }

    /// Write the current settings now. With a debounced writer the value
    /// goes through it, replacing any pending slider value.
    async fn persist_settings_now(&mut self) {
        let result = match &self.writer {
            Some(writer) => {
                writer.update(self.settings.clone());
                writer.flush().await
            }
            None => save_settings(self.kv.as_ref(), &self.settings).await,
        };
        if let Err(e) = result {
            error!(error = %format!("{e:#}"), "Failed to save settings");
            self.notify(Notice::SettingsSaveFailed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::MemoryKvStore;
    use veil_picker::GestureState;
    use veil_rules::RULES_KEY;

    struct Page {
        doc: Document,
        promo: NodeId,
        banners: Vec<NodeId>,
        span: NodeId,
        hidden: NodeId,
    }

    /// `aside#promo`, two `.ad-banner` divs, `section#main > article > span`,
    /// and a paragraph hidden by the page's own stylesheet.
    fn page() -> Page {
        let mut doc = Document::new("example.com");
        let body = doc.body();
        let promo = doc.create_element(body, "aside").unwrap();
        doc.set_attr(promo, "id", "promo").unwrap();
        let mut banners = Vec::new();
        for _ in 0..2 {
            let banner = doc.create_element(body, "div").unwrap();
            doc.set_attr(banner, "class", "ad-banner").unwrap();
            banners.push(banner);
        }
        let section = doc.create_element(body, "section").unwrap();
        doc.set_attr(section, "id", "main").unwrap();
        let article = doc.create_element(section, "article").unwrap();
        let span = doc.create_element(article, "span").unwrap();
        let hidden = doc.create_element(body, "p").unwrap();
        doc.set_stylesheet_hidden(hidden, true).unwrap();
        Page {
            doc,
            promo,
            banners,
            span,
            hidden,
        }
    }

    fn immediate() -> SessionOptions {
        SessionOptions {
            settings_quiet_period: None,
            ..SessionOptions::default()
        }
    }

    async fn open(kv: Arc<MemoryKvStore>) -> (Session, Page) {
        let page = page();
        let session = Session::open(page.doc.clone(), kv, immediate()).await;
        (session, page)
    }

    #[tokio::test]
    async fn commit_saves_scoped_rule_and_hides_element() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv.clone()).await;
        session.set_selecting(true);
        session.select(page.promo);

        let outcome = session.commit_selection().await.unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::Added {
                rule: "example.com###promo".into(),
                hidden: 1
            }
        );
        assert!(session.document().is_display_none(page.promo));
        assert!(session.engine().is_suppressed(page.promo));
        assert!(!session.is_selecting());
        assert_eq!(session.selected(), None);
        assert_eq!(
            kv.get(RULES_KEY).await.unwrap().as_deref(),
            Some(r#"["example.com###promo"]"#)
        );
        assert!(session.take_notices().contains(&Notice::RuleSaved {
            rule: "example.com###promo".into()
        }));
    }

    #[tokio::test]
    async fn commit_without_site_name_uses_empty_scope() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv).await;
        session.set_include_site_name(false).await;
        session.select(page.promo);
        session.commit_selection().await.unwrap();
        assert_eq!(session.list_rules(), ["###promo"]);
    }

    #[tokio::test]
    async fn duplicate_commit_is_reported() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv.clone()).await;
        session.commit_rule(page.promo).await.unwrap();
        let writes = kv.writes();

        assert_eq!(
            session.commit_rule(page.promo).await.unwrap(),
            CommitOutcome::Duplicate
        );
        assert_eq!(kv.writes(), writes);
        assert_eq!(session.list_rules().len(), 1);
        assert!(session.take_notices().contains(&Notice::DuplicateRule));
    }

    #[tokio::test]
    async fn failed_save_leaves_page_and_rules_untouched() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv.clone()).await;
        kv.set_fail_writes(true);

        let err = session.commit_rule(page.promo).await.unwrap_err();
        assert!(matches!(err, VeilError::Storage(_)));
        assert!(session.list_rules().is_empty());
        assert!(!session.document().is_display_none(page.promo));
        assert!(session.take_notices().contains(&Notice::RuleSaveFailed));
    }

    #[tokio::test]
    async fn already_hidden_element_is_saved_but_not_tracked() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv).await;
        session.select(page.hidden);
        session.commit_selection().await.unwrap();
        // Already hidden by the page: nothing new to hide, but the rule is kept.
        assert_eq!(session.list_rules().len(), 1);
        assert!(!session.engine().is_suppressed(page.hidden));
    }

    #[tokio::test]
    async fn delete_restores_without_ghost_hides() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv).await;
        session.commit_rule(page.promo).await.unwrap();
        session.take_notices();

        assert!(session.delete_rule("example.com###promo").await.unwrap());
        assert!(!session.document().is_display_none(page.promo));
        assert_eq!(session.document().inline_display(page.promo), None);
        assert!(session.engine().table().is_empty());
        assert_eq!(
            session.take_notices(),
            vec![Notice::RuleDeleted {
                rule: "example.com###promo".into()
            }]
        );

        assert!(!session.delete_rule("example.com###promo").await.unwrap());
    }

    #[tokio::test]
    async fn stored_rules_apply_on_open() {
        let kv = Arc::new(MemoryKvStore::with_entries([(
            RULES_KEY,
            r#"["example.com##.ad-banner","other.org###promo"]"#,
        )]));
        let (mut session, page) = open(kv).await;
        for banner in &page.banners {
            assert!(session.document().is_display_none(*banner));
        }
        assert!(!session.document().is_display_none(page.promo));

        let report = session.apply(true);
        assert_eq!(report.matched_rules, 1);
        assert_eq!(report.newly_hidden, 0);
        assert!(session
            .take_notices()
            .contains(&Notice::RulesApplied { count: 1 }));
    }

    #[tokio::test]
    async fn export_and_import_rules() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv).await;

        assert_eq!(session.export_rules().unwrap(), None);
        assert_eq!(session.take_notices(), vec![Notice::NothingToBackUp]);

        let outcome = session
            .import_rules(r#"["example.com##.ad-banner", "no separator"]"#)
            .await
            .unwrap();
        assert_eq!(outcome.rules, 2);
        assert_eq!(outcome.malformed, 1);
        assert_eq!(outcome.report.newly_hidden, 2);
        assert!(session.document().is_display_none(page.banners[0]));
        assert!(session
            .take_notices()
            .contains(&Notice::RestoreHasMalformedRules { count: 1 }));

        let backup = session.export_rules().unwrap().unwrap();
        assert!(backup.file_name.starts_with("veil_backup_"));
        assert_eq!(backup.rules, 2);
        let round: Vec<String> = serde_json::from_str(&backup.contents).unwrap();
        assert_eq!(round, session.list_rules());
    }

    #[tokio::test]
    async fn invalid_backup_is_rejected_before_storing() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv.clone()).await;
        session.commit_rule(page.promo).await.unwrap();
        session.take_notices();
        let writes = kv.writes();

        for bad in [r#"{"rules": []}"#, r#"["ok##a", 3]"#, "not json"] {
            assert!(session.import_rules(bad).await.is_err());
        }
        assert_eq!(kv.writes(), writes);
        assert_eq!(session.list_rules(), ["example.com###promo"]);
        assert!(session
            .take_notices()
            .iter()
            .all(|n| *n == Notice::InvalidBackupFile));
    }

    #[tokio::test]
    async fn temporary_disable_lifts_and_persists() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv.clone()).await;
        session.commit_rule(page.promo).await.unwrap();

        session.set_temporary_disable(true).await;
        assert!(!session.document().is_display_none(page.promo));
        assert!(session.settings().temp_blocking_disabled);

        // A new page load honours the stored switch.
        let (reopened, page2) = open(kv.clone()).await;
        assert!(!reopened.document().is_display_none(page2.promo));

        // Saving while disabled stores the rule without hiding anything.
        session.select(page.banners[0]);
        let outcome = session.commit_selection().await.unwrap();
        assert!(matches!(outcome, CommitOutcome::Added { hidden: 0, .. }));

        session.set_temporary_disable(false).await;
        assert!(session.document().is_display_none(page.promo));
        assert!(session.document().is_display_none(page.banners[0]));
    }

    #[tokio::test]
    async fn preview_hides_and_restores() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv).await;
        assert_eq!(session.toggle_preview(), PreviewToggle::Refused);
        assert_eq!(session.take_notices(), vec![Notice::NoSelection]);

        session.document_mut().set_inline_display(page.promo, "grid", false).unwrap();
        session.select(page.promo);
        assert_eq!(session.toggle_preview(), PreviewToggle::Hidden);
        assert!(session.document().is_display_none(page.promo));
        assert_eq!(session.toggle_preview(), PreviewToggle::Shown);
        let restored = session.document().inline_display(page.promo).unwrap();
        assert_eq!(restored.value, "grid");

        // Changing the selection drops the preview first.
        session.toggle_preview();
        session.select(page.banners[0]);
        assert!(!session.is_previewing());
        assert!(!session.document().is_display_none(page.promo));

        session.select(page.hidden);
        assert_eq!(session.toggle_preview(), PreviewToggle::Refused);
        assert_eq!(session.take_notices(), vec![Notice::AlreadyHidden]);
    }

    #[tokio::test]
    async fn preview_of_another_element_is_refused() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv).await;
        session.select(page.promo);
        session.preview = Some(PreviewHide {
            node: page.banners[1],
            original: None,
        });
        assert_eq!(session.toggle_preview(), PreviewToggle::Refused);
        assert_eq!(session.take_notices(), vec![Notice::DifferentElement]);
    }

    #[tokio::test]
    async fn tap_selects_and_exiting_clears_highlight() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv).await;

        let down = PointerEvent::down(10.0, 10.0).with_target(page.promo);
        assert_eq!(session.handle_pointer(&down), GestureOutcome::Ignored);

        session.set_selecting(true);
        session.handle_pointer(&down);
        let up = PointerEvent::up(14.0, 12.0).with_target(page.promo);
        assert!(matches!(
            session.handle_pointer(&up),
            GestureOutcome::Committed { node, .. } if node == page.promo
        ));
        assert_eq!(session.selected(), Some(page.promo));
        assert_eq!(
            session.document().attr(page.promo, "class"),
            Some(HIGHLIGHT_CLASS)
        );
        assert_eq!(session.preview_selector(page.promo).as_deref(), Some("#promo"));

        session.set_selecting(false);
        assert_eq!(session.selected(), None);
        assert!(!session
            .document()
            .element(page.promo)
            .unwrap()
            .has_class(HIGHLIGHT_CLASS));
    }

    #[tokio::test]
    async fn scroll_does_not_select() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv).await;
        session.set_selecting(true);
        session.handle_pointer(&PointerEvent::down(10.0, 10.0).with_target(page.promo));
        assert_eq!(
            session.handle_pointer(&PointerEvent::moved(10.0, 60.0)),
            GestureOutcome::Cancelled
        );
        session.handle_pointer(&PointerEvent::up(10.0, 60.0).with_target(page.promo));
        assert_eq!(session.selected(), None);
        assert_eq!(session.tap.state(), GestureState::Idle);
    }

    #[tokio::test]
    async fn ancestor_level_widens_selection() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, page) = open(kv).await;
        assert_eq!(session.set_ancestor_level(1), None);

        session.select(page.span);
        assert_eq!(session.max_ancestor_level(), 2);
        let article = session.set_ancestor_level(1).unwrap();
        assert_eq!(session.document().tag_name(article), Some("article"));
        assert!(!session
            .document()
            .element(page.span)
            .unwrap()
            .has_class(HIGHLIGHT_CLASS));

        let section = session.set_ancestor_level(5).unwrap();
        assert_eq!(session.document().attr(section, "id"), Some("main"));
        assert_eq!(session.ancestor_level(), 5);
        assert_eq!(
            session.rule_text_for_selection().as_deref(),
            Some("example.com###main")
        );
    }

    #[tokio::test]
    async fn slider_settings_validate_and_persist() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, _) = open(kv.clone()).await;

        session.set_panel_opacity(0.4).await.unwrap();
        assert_eq!(load_settings(kv.as_ref()).await.unwrap().panel_opacity, 0.4);

        assert!(session.set_toggle_size_scale(5.0).await.is_err());
        assert_eq!(session.settings().toggle_size_scale, 1.0);
        assert!(matches!(
            session.take_notices().as_slice(),
            [Notice::SettingOutOfRange { .. }]
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slider_writes_are_debounced() {
        let kv = Arc::new(MemoryKvStore::new());
        let mut session = Session::open(page().doc, kv.clone(), SessionOptions::default()).await;
        for value in [0.3, 0.5, 0.7] {
            session.set_toggle_opacity(value).await.unwrap();
        }
        assert_eq!(kv.writes(), 0);
        assert_eq!(session.settings().toggle_opacity, 0.7);

        session.close().await;
        assert_eq!(kv.writes(), 1);
        assert_eq!(load_settings(kv.as_ref()).await.unwrap().toggle_opacity, 0.7);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_slider_write_does_not_undo_disable_switch() {
        let kv = Arc::new(MemoryKvStore::new());
        let mut session = Session::open(page().doc, kv.clone(), SessionOptions::default()).await;
        session.set_panel_opacity(0.4).await.unwrap();
        session.set_temporary_disable(true).await;
        assert!(load_settings(kv.as_ref()).await.unwrap().temp_blocking_disabled);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let stored = load_settings(kv.as_ref()).await.unwrap();
        assert!(stored.temp_blocking_disabled);
        assert_eq!(stored.panel_opacity, 0.4);

        session.close().await;
        assert!(load_settings(kv.as_ref()).await.unwrap().temp_blocking_disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_settings_reports_failed_write() {
        let kv = Arc::new(MemoryKvStore::new());
        let mut session = Session::open(page().doc, kv.clone(), SessionOptions::default()).await;
        kv.set_fail_writes(true);
        session.set_toggle_opacity(0.5).await.unwrap();
        session.flush_settings().await;
        assert_eq!(session.take_notices(), vec![Notice::SettingsSaveFailed]);
    }

    #[tokio::test]
    async fn dragging_a_panel_moves_it_within_the_viewport() {
        let kv = Arc::new(MemoryKvStore::new());
        let (mut session, _) = open(kv).await;
        let body = session.document().body();
        let doc = session.document_mut();
        let panel = doc.create_element(body, "div").unwrap();
        doc.mark_overlay(panel).unwrap();
        doc.set_rect(panel, Rect::new(10.0, 10.0, 100.0, 50.0)).unwrap();
        let viewport = Viewport {
            width: 400.0,
            height: 300.0,
        };

        let press = PointerEvent::down(20.0, 20.0).with_target(panel);
        assert_eq!(
            session.handle_panel_pointer(panel, &press, viewport),
            DragOutcome::Pending
        );
        assert_eq!(
            session.handle_panel_pointer(panel, &PointerEvent::moved(60.0, 40.0), viewport),
            DragOutcome::Moved { x: 50.0, y: 30.0 }
        );
        session.handle_panel_pointer(panel, &PointerEvent::moved(1000.0, 40.0), viewport);
        assert_eq!(
            session.handle_panel_pointer(panel, &PointerEvent::up(1000.0, 40.0), viewport),
            DragOutcome::Ended { x: 300.0, y: 30.0 }
        );

        let rect = session.document().element(panel).unwrap().rect().unwrap();
        assert_eq!(rect, Rect::new(300.0, 30.0, 100.0, 50.0));
    }
}
